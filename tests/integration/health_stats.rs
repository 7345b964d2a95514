use crate::common::*;
use rocket::http::Status;

#[test]
fn test_health() {
    let client = test_client();
    let res = client.get("/api/v1/health").dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "agent-fabric");
}

#[test]
fn test_stats_counts() {
    let client = test_client();
    let coord = open(&client, "coord");
    let _media = open(&client, "media");
    let t1 = create_thread(&client, &coord, "t1", &["media"]);
    send(&client, &coord, &t1, "@media hello", &[]);

    let res = client.get("/api/v1/stats").dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["agents"], 2);
    assert_eq!(body["threads"], 1);
    assert_eq!(body["open_threads"], 1);
    assert_eq!(body["messages"], 1);
    assert_eq!(body["buffered_mentions"], 1);
    assert_eq!(body["dropped_mentions"], 0);
}

#[test]
fn test_unknown_route_is_json_404() {
    let client = test_client();
    let res = client.get("/api/v1/nope").dispatch();
    assert_eq!(res.status(), Status::NotFound);
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["kind"], "not_found");
}
