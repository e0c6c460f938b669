//! Scripts injected into publisher pages.
//!
//! Each script is a single expression (an immediately invoked function) so it
//! can be evaluated as-is. Item scripts return `null` when the element is
//! absent and its raw text otherwise; normalization happens in Rust.

/// ACM reference `index`: `#ref-00001 > div > div.citation-content`.
pub(super) fn acm_reference(index: usize) -> String {
    format!(
        r##"(() => {{
  const node = document.querySelector("#ref-{index:05} > div > div.citation-content");
  return node === null ? null : node.textContent;
}})()"##
    )
}

/// arXiv reference `index`: `#bib.bib<index>`, skipping the label child.
pub(super) fn arxiv_reference(index: usize) -> String {
    format!(
        r#"(() => {{
  const node = document.getElementById("bib.bib{index}");
  if (node === null) {{
    return null;
  }}
  const parts = [];
  node.childNodes.forEach((child, i) => {{
    if (i > 0) {{
      parts.push(child.textContent);
    }}
  }});
  return parts.join(" ");
}})()"#
    )
}

/// Springer reference `index`: `#ref-CR<index>`.
pub(super) fn springer_reference(index: usize) -> String {
    format!(
        r#"(() => {{
  const node = document.getElementById("ref-CR{index}");
  return node === null ? null : node.textContent;
}})()"#
    )
}

/// ACM "cited by" list as an array of strings; `null` when the list is absent.
pub(super) const ACM_CITED_BY: &str = r##"(() => {
  const list = document.querySelector("#core-cited-by > div > ul");
  if (list === null) {
    return null;
  }
  const clean = (text) => text.replaceAll("\n", " ").trim();
  const items = [];
  list.childNodes.forEach((child) => {
    const nodes = child.childNodes;
    if (nodes === null || nodes.length === 0) {
      items.push(clean(child.textContent));
      return;
    }
    let text = "";
    nodes.forEach((node) => {
      if (node.className === "entryAuthor") {
        text += Array.from(node.childNodes).map((a) => clean(a.textContent)).join(", ");
      } else {
        text += clean(node.textContent) + " ";
      }
    });
    items.push(text.trim());
  });
  return items;
})()"##;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acm_reference_pads_index() {
        assert!(acm_reference(7).contains("#ref-00007 > div > div.citation-content"));
        assert!(acm_reference(123_456).contains("#ref-123456 "));
    }

    #[test]
    fn test_arxiv_and_springer_ids() {
        assert!(arxiv_reference(12).contains(r#"getElementById("bib.bib12")"#));
        assert!(springer_reference(3).contains(r#"getElementById("ref-CR3")"#));
    }

    #[test]
    fn test_scripts_are_complete_expressions() {
        for script in [acm_reference(1), ACM_CITED_BY.to_string()] {
            assert!(script.starts_with("(() => {"));
            assert!(script.ends_with("})()"));
        }
        assert!(ACM_CITED_BY.contains(r##"querySelector("#core-cited-by > div > ul")"##));
        assert!(ACM_CITED_BY.contains("return items;"));
    }
}
