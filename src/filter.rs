use crate::model::{CatalogKind, Request};

/// Category-family prefixes worth searching the catalog for.
const ELIGIBLE_FAMILIES: &[&str] = &["Ebooks ", "Audiobooks "];

const PERIODICALS_CATEGORY: u32 = 79;
const COMICS_CATEGORY: u32 = 61;

pub fn is_eligible(request: &Request) -> bool {
    ELIGIBLE_FAMILIES
        .iter()
        .any(|family| request.category_name.starts_with(family))
        && !request.filled
        && !request.duplicate
        && request.category != PERIODICALS_CATEGORY
}

/// Catalog kind to search for a request, derived from its category.
///
/// Periodicals and comics are never looked up in the catalog.
pub fn catalog_kind(request: &Request) -> Option<CatalogKind> {
    if matches!(request.category, PERIODICALS_CATEGORY | COMICS_CATEGORY) {
        return None;
    }
    let family = request.category_name.split(' ').next()?;
    match family.parse::<CatalogKind>() {
        Ok(kind @ (CatalogKind::Ebooks | CatalogKind::Audiobooks)) => Some(kind),
        _ => None,
    }
}
