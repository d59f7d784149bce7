use crate::metadata::MetadataClient;
use crate::model::{Annotation, CatalogKind, Request};
use crate::tracker::TrackerClient;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrossReference {
    pub annotation: Annotation,
    pub torrent_url: Option<String>,
}

/// Enriches a matched request with the metadata site's entry and any
/// existing torrent for it on the tracker. Both lookups degrade to empty.
pub async fn cross_reference(
    request: &Request,
    kind: CatalogKind,
    metadata: &MetadataClient,
    tracker: &mut TrackerClient,
) -> CrossReference {
    let author = request.first_author();
    let annotation = metadata.lookup(&request.title, author).await;
    let torrent_url = tracker.find_torrent(&request.title, author, kind).await;

    tracing::debug!(
        request_id = request.id,
        metadata_url = ?annotation.url,
        torrent_url = ?torrent_url,
        "cross-referenced request"
    );
    CrossReference {
        annotation,
        torrent_url,
    }
}
