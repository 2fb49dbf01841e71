//! File-type filters for folder listings

use std::str::FromStr;

use super::types::ResourceItem;

const IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".gif", ".bmp"];
const DOCUMENT_EXTENSIONS: &[&str] = &[".pdf", ".doc", ".docx", ".txt"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileFilter {
    #[default]
    All,
    Images,
    Documents,
}

impl FileFilter {
    fn extensions(self) -> Option<&'static [&'static str]> {
        match self {
            FileFilter::All => None,
            FileFilter::Images => Some(IMAGE_EXTENSIONS),
            FileFilter::Documents => Some(DOCUMENT_EXTENSIONS),
        }
    }

    /// Case-insensitive suffix match on the item name, folders included
    pub fn matches(self, item: &ResourceItem) -> bool {
        let Some(extensions) = self.extensions() else {
            return true;
        };
        let name = item.name.to_lowercase();
        extensions.iter().any(|ext| name.ends_with(ext))
    }

    pub fn apply(self, items: Vec<ResourceItem>) -> Vec<ResourceItem> {
        items.into_iter().filter(|item| self.matches(item)).collect()
    }
}

impl FromStr for FileFilter {
    type Err = String;

    /// Unknown names fall back to no filtering, like an absent filter
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "images" => FileFilter::Images,
            "documents" => FileFilter::Documents,
            _ => FileFilter::All,
        })
    }
}

impl std::fmt::Display for FileFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileFilter::All => write!(f, "all"),
            FileFilter::Images => write!(f, "images"),
            FileFilter::Documents => write!(f, "documents"),
        }
    }
}
