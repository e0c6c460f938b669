//! The literature-review classification prompt.

pub(super) const SYSTEM_PROMPT: &str = "You are a helpful assistant.";

const BACKGROUND: &str = "
## Background
I'm a researcher conducting a Systematic Literature Review on
Large Language Model for Automated Program Repair.

## Your Task
Given the following reference item extracted from paper:
";

const INSTRUCTIONS: &str = "
Please read this carefully and find the title, authors, and year.

Next, please help me determine the relevance of this referenced article.
If the article is not about program repair, bug fix, debugging, patch synthesis, or fault/bug localization,
mark it as irrelevant. If the article is relevant to my study, judge its title
and categorize it into one of the following:

**survey**: the article is a survey, literature review, empirical study.
**technical**: the article seems to be a technical paper in which a novel methodology is proposed.
**benchmark**: the article attempts to build a dataset/benchmark for program repair research.

## Output format
Please generate json data satisfying the following TypeScript interface:
```ts

enum Category {
    Survey = 'survey',
    Technical = 'technical',
    Benchmark = 'benchmark',
    Irrelevant = 'irrelevant'
}

interface Article {
    title: string;
    authors: string[];
    year: number;
    category: Category;
}
```
**do not provide extra explanations**, and **do not use ```json and ``` quotes**.
";

/// User prompt asking the oracle to classify one reference line.
#[must_use]
pub fn build_prompt(item: &str) -> String {
    format!("{BACKGROUND}{}\n\n{INSTRUCTIONS}", item.trim())
}
