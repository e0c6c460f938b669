//! Scripts injected into search-engine result pages.
//!
//! Every script re-locates the first organic result itself: the page can
//! reflow between stages, so no node handle is carried across evaluations.

const LOCATE_RESULT_FN: &str = r##"const locateResult = () => {
    const results = document.querySelector("#gs_res_ccl_mid");
    if (results === null) {
      return null;
    }
    for (const item of results.children) {
      if (item.className) {
        return item;
      }
    }
    return null;
  };"##;

fn with_result(body: &str) -> String {
    format!("(() => {{\n  {LOCATE_RESULT_FN}\n  const result = locateResult();\n{body}\n}})()")
}

/// `true` when an organic result exists.
pub(super) fn locate_result() -> String {
    with_result("  return result !== null;")
}

/// `{abstract, url}` of the result (either may be `null`), or `null` when the
/// result node is gone.
pub(super) fn extract_metadata() -> String {
    with_result(
        r#"  if (result === null) {
    return null;
  }
  const snippet = result.querySelector(".gs_rs");
  const link = result.querySelector(".gs_rt a");
  return {
    abstract: snippet === null ? null : snippet.innerText,
    url: link === null ? null : link.href,
  };"#,
    )
}

/// Clicks the result's "cite" control. `null` when the result node is gone,
/// `false` when it has no such control.
pub(super) fn request_export() -> String {
    with_result(
        r#"  if (result === null) {
    return null;
  }
  const button = result.querySelector(".gs_or_cit.gs_nph");
  if (button === null) {
    return false;
  }
  button.click();
  return true;"#,
    )
}

/// Href of the BibTeX export link in the citation dialog, or `null`.
pub(super) fn export_url() -> String {
    with_result(
        r##"  if (result === null) {
    return null;
  }
  const dialog = document.querySelector("#gs_citi");
  if (dialog === null) {
    return null;
  }
  for (const link of dialog.children) {
    if (link.innerText && link.innerText.trim().toLowerCase() === "bibtex") {
      return link.href;
    }
  }
  return null;"##,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_script_relocates_result() {
        for script in [locate_result(), extract_metadata(), request_export(), export_url()] {
            assert!(script.starts_with("(() => {"));
            assert!(script.ends_with("})()"));
            assert!(script.contains(r##"querySelector("#gs_res_ccl_mid")"##));
            assert!(script.contains("const result = locateResult();"));
        }
    }

    #[test]
    fn test_stage_scripts_are_distinct() {
        assert!(extract_metadata().contains(".gs_rs"));
        assert!(request_export().contains(".gs_or_cit.gs_nph"));
        assert!(export_url().contains(r##"querySelector("#gs_citi")"##));
        assert!(export_url().contains(r#"=== "bibtex""#));
        assert!(!locate_result().contains("gs_citi"));
    }
}
