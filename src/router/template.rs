use crate::error::RegistrationError;
use crate::route::ParamType;
use std::sync::Arc;

/// One segment of a compiled path template.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Literal(String),
    /// `{name}` or `{name:type}`
    Param {
        name: Arc<str>,
        kind: Option<ParamType>,
    },
}

/// A route template such as `/users/{user_id:int}/posts` split into segments.
///
/// Empty segments are dropped, so `/a//b/` and `/a/b` are the same template.
#[derive(Debug, Clone, PartialEq)]
pub struct PathTemplate {
    raw: String,
    segments: Vec<Segment>,
}

impl PathTemplate {
    pub fn parse(raw: &str) -> Result<Self, RegistrationError> {
        let invalid = |reason: String| RegistrationError::InvalidTemplate {
            template: raw.to_string(),
            reason,
        };
        if !raw.starts_with('/') {
            return Err(invalid("template must start with '/'".into()));
        }

        let mut segments = Vec::new();
        for segment in raw.split('/').filter(|s| !s.is_empty()) {
            if !segment.contains('{') && !segment.contains('}') {
                segments.push(Segment::Literal(segment.to_string()));
                continue;
            }
            let inner = segment
                .strip_prefix('{')
                .and_then(|s| s.strip_suffix('}'))
                .ok_or_else(|| {
                    invalid(format!(
                        "placeholder '{segment}' must span the whole segment"
                    ))
                })?;
            let (name, kind) = match inner.split_once(':') {
                Some((name, ty)) => {
                    let kind = ParamType::from_template_name(ty.trim()).ok_or_else(|| {
                        invalid(format!("unknown placeholder type '{ty}' for '{name}'"))
                    })?;
                    (name.trim(), Some(kind))
                }
                None => (inner.trim(), None),
            };
            if !is_identifier(name) {
                return Err(invalid(format!("'{name}' is not a valid parameter name")));
            }
            let duplicate = segments
                .iter()
                .any(|s| matches!(s, Segment::Param { name: n, .. } if n.as_ref() == name));
            if duplicate {
                return Err(invalid(format!("parameter '{name}' appears twice")));
            }
            segments.push(Segment::Param {
                name: Arc::from(name),
                kind,
            });
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Placeholder names in template order.
    pub fn param_names(&self) -> impl Iterator<Item = &Arc<str>> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Param { name, .. } => Some(name),
            Segment::Literal(_) => None,
        })
    }

    /// Type annotation of a placeholder, if the template carries one.
    #[must_use]
    pub fn param_kind(&self, name: &str) -> Option<&ParamType> {
        self.segments.iter().find_map(|s| match s {
            Segment::Param { name: n, kind } if n.as_ref() == name => kind.as_ref(),
            _ => None,
        })
    }

    #[must_use]
    pub fn has_param(&self, name: &str) -> bool {
        self.param_names().any(|n| n.as_ref() == name)
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_typed_placeholder() {
        let t = PathTemplate::parse("/items/{item_id:int}").unwrap();
        assert_eq!(t.segments().len(), 2);
        assert_eq!(t.param_kind("item_id"), Some(&ParamType::Integer));
        assert_eq!(
            t.param_names().map(|n| n.to_string()).collect::<Vec<_>>(),
            vec!["item_id"]
        );
    }

    #[test]
    fn test_empty_segments_ignored() {
        let a = PathTemplate::parse("/a//b/").unwrap();
        let b = PathTemplate::parse("/a/b").unwrap();
        assert_eq!(a.segments(), b.segments());
    }

    #[test]
    fn test_root_template_has_no_segments() {
        assert!(PathTemplate::parse("/").unwrap().segments().is_empty());
    }

    #[test]
    fn test_rejects_bad_templates() {
        for bad in [
            "items",
            "/items/{id",
            "/items/pre{id}",
            "/items/{}",
            "/items/{1abc}",
            "/items/{id:uuid}",
            "/a/{id}/b/{id}",
        ] {
            assert!(
                matches!(
                    PathTemplate::parse(bad),
                    Err(RegistrationError::InvalidTemplate { .. })
                ),
                "{bad} should be rejected"
            );
        }
    }
}
