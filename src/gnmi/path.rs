use std::collections::BTreeMap;
use std::fmt;

/// One element of a [`Path`], optionally keyed: `source[name=xyz]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct PathElem {
    pub name: String,
    pub keys: BTreeMap<String, String>,
}

impl PathElem {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            keys: BTreeMap::new(),
        }
    }

    pub fn keyed(
        name: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        let mut elem = Self::new(name);
        elem.keys.insert(key.into(), value.into());
        elem
    }

    pub fn key(
        &self,
        key: &str,
    ) -> Option<&str> {
        self.keys.get(key).map(String::as_str)
    }

    /// Parses `name` or `name[k=v][k2=v2]`.
    fn parse(raw: &str) -> Self {
        let Some(open) = raw.find('[') else {
            return Self::new(raw);
        };
        let mut elem = Self::new(&raw[..open]);
        let mut rest = &raw[open..];
        while let Some(stripped) = rest.strip_prefix('[') {
            let Some(close) = stripped.find(']') else {
                break;
            };
            let pair = &stripped[..close];
            if let Some((k, v)) = pair.split_once('=') {
                elem.keys.insert(k.to_string(), v.to_string());
            }
            rest = &stripped[close + 1..];
        }
        elem
    }
}

impl fmt::Display for PathElem {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}", self.name)?;
        for (k, v) in &self.keys {
            write!(f, "[{}={}]", k, v)?;
        }
        Ok(())
    }
}

/// Keyed hierarchical path with optional origin and target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Path {
    pub origin: String,
    pub target: String,
    pub elems: Vec<PathElem>,
}

impl Path {
    pub fn new(elems: Vec<PathElem>) -> Self {
        Self {
            elems,
            ..Default::default()
        }
    }

    /// Parses `a/b[k=v]/c`. A leading `/` is ignored, and `/` inside key
    /// brackets does not split elements.
    pub fn parse(raw: &str) -> Self {
        let mut elems = Vec::new();
        let mut depth = 0usize;
        let mut start = 0usize;
        for (i, c) in raw.char_indices() {
            match c {
                '[' => depth += 1,
                ']' => depth = depth.saturating_sub(1),
                '/' if depth == 0 => {
                    if i > start {
                        elems.push(PathElem::parse(&raw[start..i]));
                    }
                    start = i + 1;
                }
                _ => {}
            }
        }
        if start < raw.len() {
            elems.push(PathElem::parse(&raw[start..]));
        }
        Self::new(elems)
    }

    pub fn with_origin(
        mut self,
        origin: impl Into<String>,
    ) -> Self {
        self.origin = origin.into();
        self
    }

    pub fn with_target(
        mut self,
        target: impl Into<String>,
    ) -> Self {
        self.target = target.into();
        self
    }

    pub fn push(
        mut self,
        elem: PathElem,
    ) -> Self {
        self.elems.push(elem);
        self
    }

    /// Appends the elements of `suffix`. Origin and target come from `self`.
    pub fn join(
        &self,
        suffix: &Path,
    ) -> Path {
        let mut joined = self.clone();
        joined.elems.extend(suffix.elems.iter().cloned());
        joined
    }

    pub fn len(&self) -> usize {
        self.elems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }

    pub fn elem(
        &self,
        index: usize,
    ) -> Option<&PathElem> {
        self.elems.get(index)
    }

    /// Name of the terminal element.
    pub fn leaf_name(&self) -> Option<&str> {
        self.elems.last().map(|e| e.name.as_str())
    }

    /// True if every element of `prefix` matches the head of `self`.
    pub fn starts_with(
        &self,
        prefix: &Path,
    ) -> bool {
        prefix.elems.len() <= self.elems.len()
            && prefix.elems.iter().zip(self.elems.iter()).all(|(a, b)| a == b)
    }
}

impl fmt::Display for Path {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        for (i, elem) in self.elems.iter().enumerate() {
            if i > 0 {
                write!(f, "/")?;
            }
            write!(f, "{}", elem)?;
        }
        Ok(())
    }
}

impl From<&str> for Path {
    fn from(raw: &str) -> Self {
        Path::parse(raw)
    }
}

/// Name keyed on the first `source[name=..]` element, if any.
pub fn datasource_name(path: &Path) -> Option<&str> {
    path.elems
        .iter()
        .find(|e| e.name == "source")
        .and_then(|e| e.key("name"))
}
