/// Clean admin-entered rich text (question statements, options, explanations).
///
/// Whitelist-based: formatting tags such as `<b>` and `<p>` survive, while
/// `<script>`, `<iframe>` and event-handler attributes are dropped. Imported and
/// AI-generated questions go through the same path before they are stored.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_formatting_drops_handlers() {
        let out = clean_html(r#"<b onclick="x()">Scope</b> creep"#);
        assert_eq!(out, "<b>Scope</b> creep");
    }
}
