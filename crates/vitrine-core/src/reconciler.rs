use crate::error::CatalogError;
use crate::paths::{self, ProductPath};
use crate::thumbs;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Move/rename request for an existing product.
#[derive(Debug, Clone)]
pub struct RenameRequest {
    pub image_path: String,
    pub new_name: String,
    pub new_category: Option<String>,
    pub new_subcategory: Option<String>,
}

/// Result of a rename/move, enough for the caller to phrase its response
/// and classify the audit entry.
#[derive(Debug)]
pub struct RenameOutcome {
    pub source: ProductPath,
    pub target: ProductPath,
    /// Category or subcategory changed, not just the name.
    pub moved: bool,
    /// Category changed; classifies the action as a move in the audit log.
    pub category_changed: bool,
}

/// A freshly stored product and whether its thumbnail could be derived.
#[derive(Debug)]
pub struct StoredProduct {
    pub path: ProductPath,
    pub thumbnail_ok: bool,
}

/// Catalog path reconciler: all mutations of the two-level category tree and
/// its mirrored thumbnail tree. Pure filesystem state, no in-memory caches.
#[derive(Debug, Clone)]
pub struct CatalogTree {
    root: PathBuf,
}

impl CatalogTree {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates `category[/subcategory]`. Conflict when the exact path already
    /// exists; intermediate directories are created, never merged over.
    pub fn create_category(
        &self,
        category: &str,
        subcategory: Option<&str>,
    ) -> Result<PathBuf, CatalogError> {
        if !paths::valid_segment(category) {
            return Err(CatalogError::invalid_name(category.to_string()));
        }
        let mut dir = self.root.join(category);
        if let Some(sub) = subcategory {
            if !paths::valid_segment(sub) {
                return Err(CatalogError::invalid_name(sub.to_string()));
            }
            dir.push(sub);
        }
        if dir.exists() {
            return Err(CatalogError::conflict(format!(
                "category already exists: {}",
                dir.display()
            )));
        }
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Stores an uploaded image at `category/[subcategory/]name.ext` and
    /// derives its thumbnail. No collision check: an existing product of the
    /// same name is overwritten.
    /// Thumbnail failures are logged and do not fail the store.
    pub fn store_product(
        &self,
        category: &str,
        subcategory: Option<&str>,
        name: &str,
        ext: &str,
        bytes: &[u8],
    ) -> Result<StoredProduct, CatalogError> {
        let product = ProductPath::new(category, subcategory, name, ext)?;
        let abs = self.root.join(product.rel_path());
        if let Some(parent) = abs.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&abs, bytes)?;

        let thumb_abs = self.root.join(product.thumbnail_rel_path());
        let thumbnail_ok = match thumbs::generate_thumbnail(&abs, &thumb_abs) {
            Ok(()) => true,
            Err(e) => {
                warn!(product = %product.rel_string(), "thumbnail generation failed: {e}");
                false
            }
        };
        Ok(StoredProduct {
            path: product,
            thumbnail_ok,
        })
    }

    /// Renames and/or moves a product, carrying its thumbnail along and
    /// cleaning up now-empty source directories.
    ///
    /// Resolution policy (intentionally asymmetric): an
    /// omitted category keeps the current one and, when the subcategory is
    /// also omitted, keeps the current subcategory too; a supplied category
    /// with an omitted subcategory moves the product to the category root.
    pub fn rename_product(&self, req: &RenameRequest) -> Result<RenameOutcome, CatalogError> {
        let source = ProductPath::parse(&req.image_path)?;
        let source_abs = self.root.join(source.rel_path());
        if !source_abs.is_file() {
            return Err(CatalogError::not_found(source.rel_string()));
        }

        let target_category = req.new_category.as_deref().unwrap_or(&source.category);
        let target_subcategory = match (&req.new_category, &req.new_subcategory) {
            (_, Some(sub)) => Some(sub.as_str()),
            (None, None) => source.subcategory.as_deref(),
            (Some(_), None) => None,
        };
        let target = ProductPath::new(
            target_category,
            target_subcategory,
            &req.new_name,
            &source.ext,
        )?;
        let target_abs = self.root.join(target.rel_path());

        if target == source {
            return Ok(RenameOutcome {
                source,
                target,
                moved: false,
                category_changed: false,
            });
        }
        if target_abs.exists() {
            return Err(CatalogError::conflict(target.rel_string()));
        }

        if let Some(parent) = target_abs.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(&source_abs, &target_abs)?;

        let source_thumb = self.root.join(source.thumbnail_rel_path());
        if source_thumb.is_file() {
            let target_thumb = self.root.join(target.thumbnail_rel_path());
            if let Some(parent) = target_thumb.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::rename(&source_thumb, &target_thumb)?;
        }

        // Best-effort: drop source directories left empty by the move.
        if let Some(dir) = source_abs.parent() {
            self.remove_empty_dirs_up_to_root(dir);
        }
        if let Some(dir) = source_thumb.parent() {
            self.remove_empty_dirs_up_to_thumbnail_root(dir);
        }

        let category_changed = target.category != source.category;
        let moved = category_changed || target.subcategory != source.subcategory;
        info!(
            from = %source.rel_string(),
            to = %target.rel_string(),
            moved,
            "product renamed"
        );
        Ok(RenameOutcome {
            source,
            target,
            moved,
            category_changed,
        })
    }

    /// Deletes a product and its thumbnail (absence of the thumbnail is
    /// tolerated). Not-found when the product file is absent. The containing
    /// directories stay, even when left empty; cleanup belongs to moves only.
    pub fn delete_product(&self, rel: &str) -> Result<ProductPath, CatalogError> {
        let product = ProductPath::parse(rel)?;
        let abs = self.root.join(product.rel_path());
        if !abs.is_file() {
            return Err(CatalogError::not_found(product.rel_string()));
        }
        fs::remove_file(&abs)?;

        let thumb = self.root.join(product.thumbnail_rel_path());
        if thumb.is_file() {
            if let Err(e) = fs::remove_file(&thumb) {
                warn!(thumbnail = %thumb.display(), "thumbnail removal failed: {e}");
            }
        }
        Ok(product)
    }

    fn remove_empty_dirs_up_to_root(&self, dir: &Path) {
        self.remove_empty_dirs_until(dir, &self.root);
    }

    fn remove_empty_dirs_up_to_thumbnail_root(&self, dir: &Path) {
        let thumb_root = self.root.join(paths::THUMBNAIL_DIR);
        self.remove_empty_dirs_until(dir, &thumb_root);
    }

    /// Walks upward from `dir` removing empty directories, stopping at
    /// `stop` (exclusive) or at the first non-empty directory.
    /// `fs::remove_dir` refuses non-empty directories, which is exactly the
    /// guarantee needed here; failures are swallowed and logged.
    fn remove_empty_dirs_until(&self, dir: &Path, stop: &Path) {
        let mut current = dir;
        while current != stop && current.starts_with(stop) {
            match fs::remove_dir(current) {
                Ok(()) => info!(dir = %current.display(), "removed empty directory"),
                Err(e) => {
                    if e.kind() != std::io::ErrorKind::NotFound {
                        // Non-empty or busy; either way cleanup stops here.
                        return;
                    }
                }
            }
            match current.parent() {
                Some(parent) => current = parent,
                None => return,
            }
        }
    }
}
