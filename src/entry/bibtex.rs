//! BibTeX record parsing and serialization.
//!
//! Used both for the input bibliography and for citation records exported by
//! the search engine, so every entry type is accepted and every field is kept
//! in source order.

const IGNORED_BLOCK_TYPES: [&str; 3] = ["comment", "preamble", "string"];

/// One parsed `@type{key, field = value, ...}` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BibtexRecord {
    /// Entry type, lowercased (`article`, `inproceedings`, `misc`, ...).
    pub entry_type: String,
    /// Citation key after `@type{`.
    pub key: String,
    fields: Vec<(String, String)>,
}

impl BibtexRecord {
    /// Creates a record with no fields.
    #[must_use]
    pub fn new(entry_type: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            entry_type: entry_type.into().to_ascii_lowercase(),
            key: key.into(),
            fields: Vec::new(),
        }
    }

    /// Returns the value of a field (case-insensitive name).
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field, _)| field.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Returns true when the field is present, even if its value is empty.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Appends a field unless one with the same name already exists.
    ///
    /// Returns true if the field was added.
    pub fn set_if_absent(&mut self, name: &str, value: impl Into<String>) -> bool {
        if self.contains(name) {
            return false;
        }
        self.fields
            .push((name.to_ascii_lowercase(), value.into()));
        true
    }

    /// Fields in source order.
    #[must_use]
    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    /// Renders the record back to BibTeX text.
    #[must_use]
    pub fn to_bibtex(&self) -> String {
        let mut out = format!("@{}{{{}", self.entry_type, self.key);
        for (name, value) in &self.fields {
            out.push_str(",\n  ");
            out.push_str(name);
            out.push_str(" = {");
            out.push_str(value);
            out.push('}');
        }
        out.push_str("\n}\n");
        out
    }
}

/// Batch parse result for BibTeX input.
#[derive(Debug, Clone, Default)]
pub struct BibtexParseResult {
    /// Parsed records in input order.
    pub records: Vec<BibtexRecord>,
    /// Actionable parse/skip messages.
    pub skipped: Vec<String>,
    /// Total candidate `@...{...}` segments discovered.
    pub total_found: usize,
}

/// Parses BibTeX records from input text.
#[tracing::instrument(skip(input), fields(input_len = input.len()))]
#[must_use]
pub fn parse_bibtex(input: &str) -> BibtexParseResult {
    let mut result = BibtexParseResult::default();
    let segments = segment_entries(input);
    result.total_found = segments.len();

    for raw_entry in &segments {
        match parse_entry(raw_entry) {
            EntryOutcome::Parsed(record) => result.records.push(record),
            EntryOutcome::Ignore => {}
            EntryOutcome::Skip(message) => result.skipped.push(message),
        }
    }

    result
}

/// Serializes records, separated by a blank line.
#[must_use]
pub fn serialize_records(records: &[BibtexRecord]) -> String {
    records
        .iter()
        .map(BibtexRecord::to_bibtex)
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug)]
enum EntryOutcome {
    Parsed(BibtexRecord),
    Ignore,
    Skip(String),
}

fn segment_entries(input: &str) -> Vec<String> {
    let chars: Vec<(usize, char)> = input.char_indices().collect();
    let mut entries = Vec::new();
    let mut i = 0usize;

    while i < chars.len() {
        if chars[i].1 != '@' {
            i += 1;
            continue;
        }

        let mut j = i + 1;
        while j < chars.len() && chars[j].1.is_ascii_alphabetic() {
            j += 1;
        }
        while j < chars.len() && chars[j].1.is_whitespace() {
            j += 1;
        }

        if j >= chars.len() || chars[j].1 != '{' {
            i += 1;
            continue;
        }

        let start = chars[i].0;
        let mut depth = 0usize;
        let mut in_quotes = false;
        let mut escape = false;
        let mut found_end = None;

        for (k, (_, ch)) in chars.iter().enumerate().skip(j) {
            if escape {
                escape = false;
                continue;
            }
            if *ch == '\\' {
                escape = true;
                continue;
            }
            // Quotes only delimit values at the top level of the entry body.
            if *ch == '"' && depth == 1 {
                in_quotes = !in_quotes;
                continue;
            }
            if in_quotes {
                continue;
            }
            if *ch == '{' {
                depth += 1;
                continue;
            }
            if *ch == '}' {
                if depth == 0 {
                    break;
                }
                depth -= 1;
                if depth == 0 {
                    found_end = Some(k);
                    break;
                }
            }
        }

        if let Some(end_index) = found_end {
            let end_exclusive = if end_index + 1 < chars.len() {
                chars[end_index + 1].0
            } else {
                input.len()
            };
            entries.push(input[start..end_exclusive].trim().to_string());
            i = end_index + 1;
        } else {
            // Unbalanced entry: capture up to the next `@` at line start and
            // keep scanning from there.
            let mut recovery = i + 1;
            while recovery < chars.len() {
                if chars[recovery].1 == '@' && matches!(chars[recovery - 1].1, '\n' | '\r') {
                    break;
                }
                recovery += 1;
            }

            if recovery < chars.len() {
                let end_exclusive = chars[recovery].0;
                entries.push(input[start..end_exclusive].trim().to_string());
                i = recovery;
                continue;
            }

            entries.push(input[start..].trim().to_string());
            break;
        }
    }

    entries
}

fn parse_entry(raw_entry: &str) -> EntryOutcome {
    let trimmed = raw_entry.trim();
    let Some(at_pos) = trimmed.find('@') else {
        return EntryOutcome::Skip(
            "malformed BibTeX entry: missing '@type{...}' prefix".to_string(),
        );
    };
    let after_at = &trimmed[at_pos + 1..];
    let Some(brace_pos) = after_at.find('{') else {
        return EntryOutcome::Skip(format!(
            "malformed BibTeX entry `{}`: missing opening '{{' after entry type",
            preview(trimmed)
        ));
    };

    let entry_type = after_at[..brace_pos].trim().to_ascii_lowercase();
    if IGNORED_BLOCK_TYPES.contains(&entry_type.as_str()) {
        return EntryOutcome::Ignore;
    }
    if entry_type.is_empty() {
        return EntryOutcome::Skip(format!(
            "malformed BibTeX entry `{}`: empty entry type",
            preview(trimmed)
        ));
    }

    if !trimmed.ends_with('}') {
        return EntryOutcome::Skip(format!(
            "malformed BibTeX entry `{}`: unbalanced braces (entry never closed)",
            preview(trimmed)
        ));
    }
    let body = &after_at[brace_pos + 1..];
    let body = &body[..body.len().saturating_sub(1)];
    let Some((key_raw, fields_raw)) = body.split_once(',') else {
        return EntryOutcome::Skip(format!(
            "malformed BibTeX entry `{}`: missing citation key or field list",
            preview(trimmed)
        ));
    };

    let key = key_raw.trim();
    if key.is_empty() {
        return EntryOutcome::Skip(format!(
            "malformed BibTeX entry `{}`: empty citation key",
            preview(trimmed)
        ));
    }

    let fields = match parse_fields(fields_raw) {
        Ok(fields) => fields,
        Err(reason) => {
            return EntryOutcome::Skip(format!(
                "malformed BibTeX field assignment in `{}`: {reason}",
                preview(trimmed)
            ));
        }
    };

    EntryOutcome::Parsed(BibtexRecord {
        entry_type,
        key: key.to_string(),
        fields,
    })
}

fn parse_fields(input: &str) -> Result<Vec<(String, String)>, String> {
    let mut pairs = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut in_quotes = false;
    let mut escape = false;

    for ch in input.chars() {
        if escape {
            current.push(ch);
            escape = false;
            continue;
        }
        if ch == '\\' {
            current.push(ch);
            escape = true;
            continue;
        }
        if ch == '"' && depth == 0 {
            in_quotes = !in_quotes;
            current.push(ch);
            continue;
        }
        if !in_quotes {
            if ch == '{' {
                depth += 1;
            } else if ch == '}' {
                if depth == 0 {
                    return Err("closing brace without matching opening brace".to_string());
                }
                depth -= 1;
            } else if ch == ',' && depth == 0 {
                let segment = current.trim();
                if !segment.is_empty() {
                    pairs.push(segment.to_string());
                }
                current.clear();
                continue;
            }
        }
        current.push(ch);
    }

    if in_quotes {
        return Err("unterminated quoted value".to_string());
    }
    if depth != 0 {
        return Err("unbalanced braces in field values".to_string());
    }

    let tail = current.trim();
    if !tail.is_empty() {
        pairs.push(tail.to_string());
    }

    let mut fields: Vec<(String, String)> = Vec::with_capacity(pairs.len());
    for pair in pairs {
        let Some((name, value_raw)) = pair.split_once('=') else {
            return Err(format!("missing '=' in field segment `{}`", preview(&pair)));
        };
        let field_name = name.trim().to_ascii_lowercase();
        if field_name.is_empty() {
            return Err("empty field name".to_string());
        }
        let value = strip_bibtex_value(value_raw.trim());
        // First-value-wins per standard BibTeX convention.
        if !fields.iter().any(|(existing, _)| *existing == field_name) {
            fields.push((field_name, value));
        }
    }

    Ok(fields)
}

fn strip_bibtex_value(value: &str) -> String {
    let trimmed = value.trim().trim_end_matches(',').trim();

    if trimmed.starts_with('{') && trimmed.ends_with('}') && trimmed.len() >= 2 {
        return trimmed[1..trimmed.len() - 1].trim().to_string();
    }
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        let inner = &trimmed[1..trimmed.len() - 1];
        return inner.replace("\\\"", "\"").trim().to_string();
    }

    trimmed.to_string()
}

fn preview(input: &str) -> String {
    const MAX: usize = 80;
    if input.chars().count() <= MAX {
        return input.to_string();
    }
    let shortened: String = input.chars().take(MAX).collect();
    format!("{shortened}...")
}
