// Minimal INI reader for cloudmonkey-style config files
//
// Supports `[section]` headers, `key = value` and `key: value` pairs, `#` and
// `;` comment lines, and indented continuation lines. Keys are lower-cased;
// values are trimmed. Entries of a `[DEFAULT]` section are visible in every
// other section unless overridden there.

use std::collections::BTreeMap;

pub type Section = BTreeMap<String, String>;

#[derive(Debug, Default)]
pub struct IniDocument {
    defaults: Section,
    sections: BTreeMap<String, Section>,
}

impl IniDocument {
    pub fn parse(text: &str) -> Result<Self, String> {
        let mut doc = IniDocument::default();
        let mut current: Option<String> = None;
        let mut last_key: Option<String> = None;

        for (idx, raw) in text.lines().enumerate() {
            let lineno = idx + 1;
            let trimmed = raw.trim();

            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
                continue;
            }

            // Continuation of the previous value
            if raw.starts_with(char::is_whitespace) {
                if let (Some(section), Some(key)) = (&current, &last_key) {
                    let map = doc.section_mut(section);
                    if let Some(value) = map.get_mut(key) {
                        value.push('\n');
                        value.push_str(trimmed);
                        continue;
                    }
                }
            }

            if let Some(rest) = trimmed.strip_prefix('[') {
                let name = rest
                    .strip_suffix(']')
                    .ok_or_else(|| format!("line {}: unterminated section header", lineno))?
                    .trim();
                if name.is_empty() {
                    return Err(format!("line {}: empty section name", lineno));
                }
                doc.section_mut(name);
                current = Some(name.to_string());
                last_key = None;
                continue;
            }

            let section = current
                .as_deref()
                .ok_or_else(|| format!("line {}: option outside of any section", lineno))?;
            let split = trimmed
                .find(['=', ':'])
                .ok_or_else(|| format!("line {}: expected 'key = value'", lineno))?;
            let key = trimmed[..split].trim().to_lowercase();
            let value = trimmed[split + 1..].trim().to_string();
            if key.is_empty() {
                return Err(format!("line {}: empty key", lineno));
            }
            doc.section_mut(section).insert(key.clone(), value);
            last_key = Some(key);
        }

        Ok(doc)
    }

    fn section_mut(&mut self, name: &str) -> &mut Section {
        if name == "DEFAULT" {
            &mut self.defaults
        } else {
            self.sections.entry(name.to_string()).or_default()
        }
    }

    pub fn has_section(&self, name: &str) -> bool {
        self.sections.contains_key(name)
    }

    /// Section contents merged over `[DEFAULT]`.
    pub fn section(&self, name: &str) -> Option<Section> {
        let own = self.sections.get(name)?;
        let mut merged = self.defaults.clone();
        merged.extend(own.iter().map(|(k, v)| (k.clone(), v.clone())));
        Some(merged)
    }

    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLOUDMONKEY: &str = "\
[core]
profile = lab
asyncblock = true

# lab environment
[lab]
url = http://cloud.lab:8080/client/api
apikey = AK-lab
secretkey : SK-lab
DB_Host = db.lab
";

    #[test]
    fn parses_sections_and_both_separators() {
        let doc = IniDocument::parse(CLOUDMONKEY).unwrap();
        assert!(doc.has_section("core"));
        let lab = doc.section("lab").unwrap();
        assert_eq!(lab["url"], "http://cloud.lab:8080/client/api");
        assert_eq!(lab["secretkey"], "SK-lab");
        // keys are case-insensitive
        assert_eq!(lab["db_host"], "db.lab");
        assert_eq!(doc.section_names().collect::<Vec<_>>(), vec!["core", "lab"]);
    }

    #[test]
    fn value_keeps_equals_signs() {
        let doc = IniDocument::parse("[r]\nsecretkey = abc==\n").unwrap();
        assert_eq!(doc.section("r").unwrap()["secretkey"], "abc==");
    }

    #[test]
    fn defaults_fill_missing_keys() {
        let doc = IniDocument::parse("[DEFAULT]\ndb_user = cloud\n[a]\nurl = x\n[b]\ndb_user = root\n").unwrap();
        assert_eq!(doc.section("a").unwrap()["db_user"], "cloud");
        assert_eq!(doc.section("b").unwrap()["db_user"], "root");
        assert!(!doc.has_section("DEFAULT"));
    }

    #[test]
    fn continuation_lines_append() {
        let doc = IniDocument::parse("[r]\nnote = first\n  second\n").unwrap();
        assert_eq!(doc.section("r").unwrap()["note"], "first\nsecond");
    }

    #[test]
    fn rejects_orphan_option() {
        let err = IniDocument::parse("url = x\n").unwrap_err();
        assert!(err.contains("line 1"));
    }

    #[test]
    fn rejects_bad_header() {
        assert!(IniDocument::parse("[lab\nurl = x\n").is_err());
    }

    #[test]
    fn unknown_section_is_none() {
        let doc = IniDocument::parse(CLOUDMONKEY).unwrap();
        assert!(doc.section("prod").is_none());
    }
}
