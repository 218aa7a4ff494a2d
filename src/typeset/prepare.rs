use once_cell::sync::Lazy;
use regex::Regex;

/// Definition of the list-tightening macro that pandoc's LaTeX writer emits calls to.
pub const TIGHTLIST_MACRO: &str =
    r"\providecommand{\tightlist}{\setlength{\itemsep}{0pt}\setlength{\parskip}{0pt}}";

/// Section-opener overrides for the legacy template family: unnumbered sections that
/// always start a new page.
pub const LEGACY_SECTION_PATCH: &str = r"\makeatletter
\let\msf@section\section
\renewcommand{\section}{\clearpage\msf@section}
\makeatother
\setcounter{secnumdepth}{0}";

static TIGHTLIST_DEFINED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\\(?:(?:new|renew|provide)command\*?\s*\{?\s*\\tightlist\b|def\s*\\tightlist\b)")
        .expect("valid tightlist regex")
});

/// Returns true if the content already defines `\tightlist`.
#[must_use]
pub fn defines_tightlist(content: &str) -> bool {
    TIGHTLIST_DEFINED.is_match(content)
}

/// Prepends the raw LaTeX preamble the compiler needs to `content`.
///
/// The block carries the `\tightlist` definition unless the content has its own, followed
/// by any compatibility directives of the layout template.
#[must_use]
pub fn prepare_content(content: &str, compat_directives: Option<&str>) -> String {
    let mut directives = Vec::new();

    if !defines_tightlist(content) {
        directives.push(TIGHTLIST_MACRO);
    }
    if let Some(compat) = compat_directives.map(str::trim).filter(|c| !c.is_empty()) {
        directives.push(compat);
    }

    if directives.is_empty() {
        return content.to_string();
    }

    format!(
        "```{{=latex}}\n{}\n```\n\n{}",
        directives.join("\n"),
        content
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_injects_tightlist_once() {
        let out = prepare_content("## Scene\n\nBody", None);
        assert!(out.starts_with("```{=latex}\n\\providecommand{\\tightlist}"));
        assert!(out.ends_with("## Scene\n\nBody"));

        let again = prepare_content(&out, None);
        assert_eq!(again, out);
    }

    #[test]
    fn test_existing_definitions_detected() {
        assert!(defines_tightlist("\\newcommand{\\tightlist}{}"));
        assert!(defines_tightlist("\\providecommand*{\\tightlist}{}"));
        assert!(defines_tightlist("\\def\\tightlist{}"));
        assert!(!defines_tightlist("\\tightlist used only"));
    }

    #[test]
    fn test_compat_directives_appended() {
        let out = prepare_content("Body", Some(LEGACY_SECTION_PATCH));
        let tight = out.find("\\tightlist").unwrap();
        let patch = out.find("\\clearpage").unwrap();
        assert!(tight < patch);
        assert!(out.ends_with("```\n\nBody"));
    }

    #[test]
    fn test_nothing_to_inject() {
        let content = "\\def\\tightlist{}\nBody";
        assert_eq!(prepare_content(content, Some("  ")), content);
    }
}
