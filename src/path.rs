use std::fmt;

/// Separator between element names in a path string.
pub const SEPARATOR: char = ':';

/// A location in the element tree: one or more element names.
///
/// `"x1:x1:xxx"`, `["x1", "x1", "xxx"]` and `["x1:x1", "xxx"]` all normalize
/// to the same three segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Path {
    segments: Vec<String>,
}

impl Path {
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let segments = parts
            .into_iter()
            .flat_map(|part| {
                part.as_ref()
                    .split(SEPARATOR)
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .collect();
        Self { segments }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// First segment, if any.
    pub fn head(&self) -> Option<&str> {
        self.segments.first().map(String::as_str)
    }

    /// Everything after the first segment.
    pub fn tail(&self) -> &[String] {
        self.segments.get(1..).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn is_simple(&self) -> bool {
        self.segments.len() == 1
    }

    pub fn is_complex(&self) -> bool {
        self.segments.len() > 1
    }

    /// Extend with a child segment.
    pub fn child(&self, name: &str) -> Path {
        let mut segments = self.segments.clone();
        segments.push(name.to_string());
        Path { segments }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join(":"))
    }
}

impl From<&str> for Path {
    fn from(s: &str) -> Self {
        Path::new([s])
    }
}

impl From<String> for Path {
    fn from(s: String) -> Self {
        Path::new([s])
    }
}

impl From<&String> for Path {
    fn from(s: &String) -> Self {
        Path::new([s])
    }
}

impl From<&Path> for Path {
    fn from(p: &Path) -> Self {
        p.clone()
    }
}

impl<const N: usize> From<[&str; N]> for Path {
    fn from(parts: [&str; N]) -> Self {
        Path::new(parts)
    }
}

impl From<&[&str]> for Path {
    fn from(parts: &[&str]) -> Self {
        Path::new(parts)
    }
}

impl From<Vec<&str>> for Path {
    fn from(parts: Vec<&str>) -> Self {
        Path::new(parts)
    }
}

impl From<Vec<String>> for Path {
    fn from(parts: Vec<String>) -> Self {
        Path::new(parts)
    }
}
