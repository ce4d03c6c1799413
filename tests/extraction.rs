// Extraction properties on whole pages, through the public API only.

use pretty_assertions::assert_eq;
use sni_corpus::{DataExtractor, ExtractError, ExtractOptions, MAX_TEXT_CHARS};

const COMPANY_PAGE: &str = r#"<!DOCTYPE html>
<html lang="sv">
<head>
  <title>Norrbygg AB</title>
  <meta charset="utf-8">
  <meta name="description" content="Byggföretag i Norrbotten">
  <meta name="keywords" content="bygg, renovering">
  <meta property="og:title" content="Norrbygg AB">
  <script>window.dataLayer = [];</script>
</head>
<body>
  <div class="cookie-notice"><p>Vi använder cookies.</p><button>OK</button></div>
  <nav><a href="/">Hem</a> | <a href="/tjanster">Tjänster</a></nav>
  <h1>Välkommen till Norrbygg</h1>
  <p>Vi bygger och renoverar hus i hela länet.</p>
  <p>Sedan 1985 har vi byggt över 300 villor.</p>
  <p>Vi bygger och renoverar hus i hela länet.</p>
  <footer>
    <a href="tel:0920-12 34 56">0920-12 34 56</a>
    <a href="mailto:info@norrbygg.se">info@norrbygg.se</a>
  </footer>
</body>
</html>"#;

fn extractor() -> DataExtractor {
    let mut extractor = DataExtractor::new();
    extractor.load(COMPANY_PAGE).unwrap();
    extractor
}

#[test]
fn test_default_extraction() {
    let text = extractor().extract(&ExtractOptions::default()).unwrap();
    assert_eq!(
        text,
        "Välkommen till Norrbygg Vi bygger och renoverar hus i hela länet. \
         Byggföretag i Norrbotten Norrbygg AB"
    );
}

#[test]
fn test_paragraphs_only() {
    let options = ExtractOptions::default()
        .with_paragraphs_only(true)
        .with_extract_meta(false);
    let text = extractor().extract(&options).unwrap();
    assert_eq!(text, "Vi bygger och renoverar hus i hela länet.");
}

#[test]
fn test_unfiltered_keeps_everything_visible() {
    let options = ExtractOptions::default()
        .with_filter(false)
        .with_extract_meta(false);
    let text = extractor().extract(&options).unwrap();
    for expected in ["Vi använder cookies.", "Hem", "|", "Sedan 1985", "0920-12 34 56"] {
        assert!(text.contains(expected), "missing {expected:?} in {text:?}");
    }
    assert!(!text.contains("dataLayer"), "script text is never visible");
    assert!(!text.contains("Norrbygg AB"), "<title> is not body text");
}

#[test]
fn test_unfiltered_meta_includes_every_named_tag() {
    let options = ExtractOptions::default()
        .with_filter(false)
        .with_extract_body(false);
    let text = extractor().extract(&options).unwrap();
    assert_eq!(text, "Byggföretag i Norrbotten bygg, renovering Norrbygg AB");
}

#[test]
fn test_contact_data() {
    let extractor = extractor();
    // Extraction must not consume the links.
    extractor.extract(&ExtractOptions::default()).unwrap();
    let data = extractor.extract_simple_data().unwrap();
    assert_eq!(data.tel, vec!["0920123456"]);
    assert_eq!(data.email, vec!["info@norrbygg.se"]);
}

#[test]
fn test_load_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("page.html");
    std::fs::write(&path, COMPANY_PAGE).unwrap();

    let mut from_file = DataExtractor::new();
    from_file.load_file(&path).unwrap();
    let options = ExtractOptions::default();
    assert_eq!(
        from_file.extract(&options).unwrap(),
        extractor().extract(&options).unwrap()
    );

    let err = from_file.load_file(dir.path().join("missing.html")).unwrap_err();
    assert!(matches!(err, ExtractError::NotFound(_)));
    assert!(matches!(
        from_file.extract(&options),
        Err(ExtractError::NoDocument)
    ));
}

#[test]
fn test_extraction_has_no_length_limit() {
    let word = "träd ";
    let body = word.repeat(MAX_TEXT_CHARS / word.chars().count() + 10);
    let html = format!("<html><body><p>{body}</p></body></html>");
    let mut extractor = DataExtractor::new();
    extractor.load(&html).unwrap();
    let text = extractor
        .extract(&ExtractOptions::default().with_filter(false))
        .unwrap();
    assert!(text.chars().count() > MAX_TEXT_CHARS);
}
