mod common;

use std::io::Write;

use common::{error_kind, Harness};
use serde_json::json;
use tokio_test::assert_ok;

#[tokio::test]
async fn create_stemcell_uploads_image() {
    let h = Harness::new().await;
    h.mount_task("POST", "/v1/images", "t-img", "fake-image-id")
        .await;

    let mut image = tempfile::NamedTempFile::new().unwrap();
    assert_ok!(image.write_all(b"stemcell bits"));

    let resp = h
        .call(
            "create_stemcell",
            json!([image.path().to_str().unwrap(), {"name": "ubuntu"}]),
        )
        .await;

    assert!(resp.error.is_none(), "{resp:?}");
    assert_eq!(resp.result, Some(json!("fake-image-id")));
}

#[tokio::test]
async fn create_stemcell_missing_image_file() {
    let h = Harness::new().await;
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("image.tgz");

    let resp = h
        .call("create_stemcell", json!([missing.to_str().unwrap()]))
        .await;

    assert_eq!(error_kind(&resp), ("CloudError", false));
    assert!(h.server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn delete_stemcell() {
    let h = Harness::new().await;
    h.mount_task("DELETE", "/v1/images/fake-image-id", "t-img", "fake-image-id")
        .await;

    let resp = h.call("delete_stemcell", json!(["fake-image-id"])).await;

    assert!(resp.error.is_none(), "{resp:?}");
    assert!(resp.result.is_none());
}

#[tokio::test]
async fn method_name_is_case_insensitive() {
    let h = Harness::new().await;
    h.mount_task("DELETE", "/v1/images/fake-image-id", "t-img", "fake-image-id")
        .await;

    let resp = h.call("Delete_Stemcell", json!(["fake-image-id"])).await;

    assert!(resp.error.is_none(), "{resp:?}");
}
