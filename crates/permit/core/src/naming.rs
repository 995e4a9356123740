/// Maps accessor names to property names.
pub trait NamingConvention: Send + Sync {
    fn normalize(&self, name: &str) -> String;
}

/// Strips accessor prefixes such as `get_`/`is_` (snake case) and
/// `get`/`is` before an uppercase letter (camel case).
#[derive(Clone, Debug)]
pub struct PrefixNamingConvention {
    prefixes: Vec<String>,
}

impl PrefixNamingConvention {
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            prefixes: prefixes.into_iter().map(Into::into).collect(),
        }
    }
}

impl Default for PrefixNamingConvention {
    fn default() -> Self {
        Self::new(["get", "is"])
    }
}

impl NamingConvention for PrefixNamingConvention {
    fn normalize(&self, name: &str) -> String {
        for prefix in &self.prefixes {
            let Some(rest) = name.strip_prefix(prefix.as_str()) else {
                continue;
            };
            if let Some(snake) = rest.strip_prefix('_') {
                if !snake.is_empty() {
                    return snake.to_string();
                }
            }
            let mut chars = rest.chars();
            if let Some(first) = chars.next() {
                if first.is_uppercase() {
                    return first.to_lowercase().chain(chars).collect();
                }
            }
        }
        name.to_string()
    }
}
