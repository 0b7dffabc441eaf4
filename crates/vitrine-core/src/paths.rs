use crate::error::CatalogError;
use std::path::PathBuf;

/// Mirror directory holding derived preview images.
pub const THUMBNAIL_DIR: &str = ".thumbnails";

/// Extensions accepted for product images, lowercase.
pub const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];

/// A single path segment is valid when it cannot escape the catalog root or
/// shadow the thumbnail mirror: non-empty, no separators, no `..`, and no
/// leading dot.
#[must_use]
pub fn valid_segment(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && name != ".."
        && !name.contains(['/', '\\'])
        && !name.contains('\0')
        && !name.ends_with(' ')
}

fn checked_segment(name: &str) -> Result<&str, CatalogError> {
    if valid_segment(name) {
        Ok(name)
    } else {
        Err(CatalogError::invalid_name(name.to_string()))
    }
}

#[must_use]
pub fn is_image_extension(ext: &str) -> bool {
    IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str())
}

/// Identity of a product: its relative location inside the catalog tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductPath {
    pub category: String,
    pub subcategory: Option<String>,
    pub stem: String,
    pub ext: String,
}

impl ProductPath {
    pub fn new(
        category: &str,
        subcategory: Option<&str>,
        stem: &str,
        ext: &str,
    ) -> Result<Self, CatalogError> {
        Ok(Self {
            category: checked_segment(category)?.to_string(),
            subcategory: subcategory
                .map(|s| checked_segment(s).map(str::to_string))
                .transpose()?,
            stem: checked_segment(stem)?.to_string(),
            ext: {
                if ext.is_empty() || ext.contains(['/', '\\', '.']) {
                    return Err(CatalogError::invalid_name(format!("extension {ext:?}")));
                }
                ext.to_string()
            },
        })
    }

    /// Parses a `category/[subcategory/]name.ext` relative path.
    pub fn parse(rel: &str) -> Result<Self, CatalogError> {
        let segments: Vec<&str> = rel.split('/').collect();
        let (category, subcategory, file) = match segments.as_slice() {
            [category, file] => (*category, None, *file),
            [category, subcategory, file] => (*category, Some(*subcategory), *file),
            _ => return Err(CatalogError::invalid_name(rel.to_string())),
        };
        let (stem, ext) = file
            .rsplit_once('.')
            .filter(|(stem, ext)| !stem.is_empty() && !ext.is_empty())
            .ok_or_else(|| CatalogError::invalid_name(file.to_string()))?;
        Self::new(category, subcategory, stem, ext)
    }

    /// Relative path of the product file, always forward-slashed.
    #[must_use]
    pub fn rel_string(&self) -> String {
        match &self.subcategory {
            Some(sub) => format!("{}/{}/{}.{}", self.category, sub, self.stem, self.ext),
            None => format!("{}/{}.{}", self.category, self.stem, self.ext),
        }
    }

    #[must_use]
    pub fn rel_path(&self) -> PathBuf {
        let mut path = PathBuf::from(&self.category);
        if let Some(sub) = &self.subcategory {
            path.push(sub);
        }
        path.push(format!("{}.{}", self.stem, self.ext));
        path
    }

    /// Mirrored thumbnail location: `.thumbnails` prefix, forced `.jpg`.
    #[must_use]
    pub fn thumbnail_rel_path(&self) -> PathBuf {
        let mut path = PathBuf::from(THUMBNAIL_DIR);
        path.push(&self.category);
        if let Some(sub) = &self.subcategory {
            path.push(sub);
        }
        path.push(format!("{}.jpg", self.stem));
        path
    }
}
