use std::collections::BTreeMap;

/// A generic XML tree node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlNode {
    /// Element tag name.
    pub tag: String,
    /// XML attributes keyed by name.
    pub attributes: BTreeMap<String, String>,
    /// Child elements.
    pub children: Vec<XmlNode>,
    /// Optional text content.
    pub text: Option<String>,
}

impl XmlNode {
    /// Create a new XML node with no attributes, children, or text.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    /// Create a leaf element holding `text`.
    pub fn leaf(tag: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// Create an `<entry name="...">` element, the keyed-list shape used
    /// throughout the configuration tree.
    pub fn entry(name: impl Into<String>) -> Self {
        Self::new("entry").with_attr("name", name)
    }

    /// Create `<tag><member>a</member><member>b</member></tag>`.
    pub fn members<I, S>(tag: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut node = Self::new(tag);
        node.children = values
            .into_iter()
            .map(|v| Self::leaf("member", v))
            .collect();
        node
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_child(mut self, child: XmlNode) -> Self {
        self.children.push(child);
        self
    }

    /// Append a child element.
    pub fn push(&mut self, child: XmlNode) {
        self.children.push(child);
    }

    /// Append a leaf child only when `text` is present.
    pub fn push_opt(&mut self, tag: &str, text: Option<&str>) {
        if let Some(text) = text {
            self.children.push(Self::leaf(tag, text));
        }
    }

    /// Look up an attribute value.
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Return the first child with the provided tag.
    pub fn get_child(&self, tag: &str) -> Option<&XmlNode> {
        self.children.iter().find(|child| child.tag == tag)
    }

    /// Return all children with the provided tag.
    pub fn get_children(&self, tag: &str) -> Vec<&XmlNode> {
        self.children
            .iter()
            .filter(|child| child.tag == tag)
            .collect()
    }

    /// Walk a nested child path and return terminal node text if found.
    pub fn get_text<'a>(&'a self, path: &[&str]) -> Option<&'a str> {
        if path.is_empty() {
            return self.text.as_deref();
        }

        let mut current = self;
        for segment in path {
            current = current.get_child(segment)?;
        }
        current.text.as_deref()
    }

    /// Collect the `<member>` texts of the child named `tag`.
    ///
    /// A missing child yields an empty list.
    pub fn member_texts(&self, tag: &str) -> Vec<String> {
        self.get_child(tag)
            .map(|list| {
                list.get_children("member")
                    .into_iter()
                    .filter_map(|m| m.text.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Collect the `name` attributes of `<entry>` children of the child
    /// named `tag`.
    pub fn entry_names(&self, tag: &str) -> Vec<String> {
        self.get_child(tag)
            .map(|list| {
                list.get_children("entry")
                    .into_iter()
                    .filter_map(|e| e.attr("name").map(String::from))
                    .collect()
            })
            .unwrap_or_default()
    }
}
