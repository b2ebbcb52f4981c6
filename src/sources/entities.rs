//! HTML entity decoding for text fields coming from the CMS and video API.

/// Decode numeric (`&#8217;`, `&#x2019;`) and HTML5 named entities.
///
/// Unknown or malformed entities are left untouched.
pub fn decode_html_entities(input: &str) -> String {
  html_escape::decode_html_entities(input).into_owned()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_numeric_entities() {
    assert_eq!(decode_html_entities("It&#8217;s"), "It\u{2019}s");
    assert_eq!(decode_html_entities("A &#x26; B"), "A & B");
    assert_eq!(decode_html_entities("Q&#038;A"), "Q&A");
  }

  #[test]
  fn test_named_entities() {
    assert_eq!(
      decode_html_entities("&lt;p&gt;Tom &amp; Jerry&hellip;&lt;/p&gt;"),
      "<p>Tom & Jerry\u{2026}</p>"
    );
  }

  #[test]
  fn test_accented_and_symbol_entities() {
    assert_eq!(
      decode_html_entities("Caf&eacute; &ntilde; &times; &euro;"),
      "Café ñ × €"
    );
  }

  #[test]
  fn test_unknown_entities_left_alone() {
    assert_eq!(decode_html_entities("&bogus; text"), "&bogus; text");
    assert_eq!(decode_html_entities("a && b"), "a && b");
  }

  #[test]
  fn test_plain_text_unchanged() {
    assert_eq!(decode_html_entities("Hello, world"), "Hello, world");
    assert_eq!(decode_html_entities("ঢাকা"), "ঢাকা");
  }
}
