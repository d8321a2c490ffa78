use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::helpers::{header_row, text_event, TestApp, DISPLAY_NAME, TOKEN, USER_ID};

const ADMIN_ID: &str = "Uf8fbfcfdfeff00112233445566778899";

#[tokio::test]
async fn approve_command_sends_a_confirm_prompt_with_the_token() {
    let test_app = TestApp::spawn_app().await;

    test_app.mount_profile(USER_ID, DISPLAY_NAME).await;
    test_app.mount_any_reply().await;

    test_app
        .post_webhook(text_event(USER_ID, "approve"))
        .await
        .unwrap();

    let replies = test_app.sent_replies().await;
    let message = &replies[0]["messages"][0];
    assert_eq!(message["type"], "template");
    assert_eq!(message["template"]["type"], "confirm");
    assert_eq!(
        message["template"]["actions"][0]["text"],
        format!("Approve subscriber \"{}\" ({})", DISPLAY_NAME, TOKEN)
    );
    assert_eq!(
        message["template"]["actions"][1]["text"],
        format!("Reject subscriber \"{}\" ({})", DISPLAY_NAME, TOKEN)
    );
}

#[tokio::test]
async fn approval_reply_subscribes_the_user_behind_the_token() {
    let test_app = TestApp::spawn_app().await;

    test_app.mount_sheet_rows(serde_json::json!([header_row()])).await;
    test_app.mount_profile(USER_ID, DISPLAY_NAME).await;
    test_app.mount_any_reply().await;

    Mock::given(method("POST"))
        .and(path(test_app.append_path()))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&test_app.sheets_server)
        .await;

    let text = format!("Approve subscriber \"{}\" ({})", DISPLAY_NAME, TOKEN);
    test_app
        .post_webhook(text_event(ADMIN_ID, &text))
        .await
        .unwrap();

    let replies = test_app.sent_replies().await;
    assert_eq!(replies[0]["messages"][0]["text"], "Approved, Nguan ffr");

    let appended = test_app
        .sheets_server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .find(|request| request.url.path() == test_app.append_path())
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&appended.body).unwrap();
    assert_eq!(body["values"][0][0], USER_ID);
}

#[tokio::test]
async fn rejection_reply_names_the_user_without_touching_the_sheet() {
    let test_app = TestApp::spawn_app().await;

    test_app.mount_profile(USER_ID, DISPLAY_NAME).await;
    test_app.mount_any_reply().await;

    Mock::given(wiremock::matchers::any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&test_app.sheets_server)
        .await;

    let text = format!("Reject subscriber \"{}\" ({})", DISPLAY_NAME, TOKEN);
    test_app
        .post_webhook(text_event(ADMIN_ID, &text))
        .await
        .unwrap();

    let replies = test_app.sent_replies().await;
    assert_eq!(replies[0]["messages"][0]["text"], "Rejected, Nguan ffr");
}

#[tokio::test]
async fn prompt_texts_round_trip_through_the_chat() {
    let test_app = TestApp::spawn_app().await;

    test_app.mount_sheet_rows(serde_json::json!([header_row()])).await;
    test_app.mount_profile(USER_ID, "Bob (work)").await;
    test_app.mount_any_reply().await;

    Mock::given(method("POST"))
        .and(path(test_app.append_path()))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&test_app.sheets_server)
        .await;

    test_app
        .post_webhook(text_event(USER_ID, "approve"))
        .await
        .unwrap();
    let prompt = test_app.sent_replies().await;
    let approve_text = prompt[0]["messages"][0]["template"]["actions"][0]["text"]
        .as_str()
        .unwrap()
        .to_owned();

    // The administrator taps "Approve": the button text comes back as a message.
    test_app
        .post_webhook(text_event(ADMIN_ID, &approve_text))
        .await
        .unwrap();

    let replies = test_app.sent_replies().await;
    assert_eq!(replies[1]["messages"][0]["text"], "Approved, Bob (work)");
}
