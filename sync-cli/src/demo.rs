//! Offline demo library served by `--mock`.

use albumsync_client::MockPhotoApi;
use albumsync_types::{AlbumSyncResult, Breadcrumb, FolderListing, TreeNode};

/// A small album tree: two years of photos and a trip folder.
pub fn photo_api() -> MockPhotoApi {
    let api = MockPhotoApi::new();

    api.set_listing(
        "",
        FolderListing::new(
            vec![
                TreeNode::folder("y2024", "2024", "", 2),
                TreeNode::folder("trips", "Trips", "", 1),
                TreeNode::album("A001", "Favourites", "", 42),
            ],
            vec![],
        ),
    );
    api.set_listing(
        "/2024",
        FolderListing::new(
            vec![
                TreeNode::album("A201", "Spring", "/2024", 31),
                TreeNode::album("A202", "Summer", "/2024", 57),
            ],
            vec![Breadcrumb::new("y2024", "2024")],
        ),
    );
    api.set_listing(
        "/Trips",
        FolderListing::new(
            vec![TreeNode::folder("italy", "Italy", "/Trips", 2)],
            vec![Breadcrumb::new("trips", "Trips")],
        ),
    );
    api.set_listing(
        "/Trips/Italy",
        FolderListing::new(
            vec![
                TreeNode::album("A123", "Rome", "/Trips/Italy", 10),
                TreeNode::album("A124", "Florence", "/Trips/Italy", 8),
            ],
            vec![
                Breadcrumb::new("trips", "Trips"),
                Breadcrumb::new("italy", "Italy"),
            ],
        ),
    );

    for (id, name, count) in [
        ("A001", "Favourites", 42),
        ("A201", "Spring", 31),
        ("A202", "Summer", 57),
        ("A123", "Rome", 10),
        ("A124", "Florence", 8),
    ] {
        api.set_sync_result(
            id,
            AlbumSyncResult {
                synced_count: count,
                album_name: name.to_string(),
            },
        );
    }

    api
}
