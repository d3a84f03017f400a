use axum::{
    Router, middleware,
    routing::{delete, get, post, put},
};

use crate::middleware::{require_auth, require_notification_token};
use crate::state::AppState;
use crate::{auth, beta_keys, black_lists, frames, galeries, notifications, reports, tickets, users};

pub async fn health() -> &'static str {
    "ok"
}

/// Every route of the API. Transport layers (CORS, tracing) are added by the
/// binary.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/users/signup", post(auth::signup))
        .route("/users/login", post(auth::login))
        .route("/users/refreshToken", get(auth::refresh))
        .with_state(state.clone());

    let trusted_routes = Router::new()
        .route("/notifications", post(notifications::post_notification))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_notification_token))
        .with_state(state.clone());

    let protected_routes = Router::new()
        // Users
        .route("/users/logout", post(auth::logout))
        .route("/users/me", get(users::get_me).delete(users::delete_me))
        .route("/users/me/profilePictures", post(users::create_profile_picture))
        .route("/users/me/profilePictures/{picture_id}", delete(users::delete_profile_picture))
        .route("/users/{user_id}", get(users::get_user))
        .route("/users/{user_id}/role", put(users::change_role))
        .route("/users/{user_id}/blackLists", post(black_lists::create_black_list))
        .route("/profilePictures/{picture_id}/reports", post(reports::report_profile_picture))
        // Galeries
        .route("/galeries", get(galeries::list_galeries).post(galeries::create_galerie))
        .route("/galeries/subscribe/{code}", post(galeries::subscribe))
        .route("/galeries/{galerie_id}", get(galeries::get_galerie))
        .route("/galeries/{galerie_id}/leave", post(galeries::leave_galerie))
        .route("/galeries/{galerie_id}/invitations", post(galeries::create_invitation))
        .route("/galeries/{galerie_id}/users/{user_id}/role", put(galeries::change_galerie_role))
        .route("/galeries/{galerie_id}/frames", get(frames::list_frames).post(frames::post_frame))
        // Frames
        .route("/frames/{frame_id}", delete(frames::delete_frame))
        .route("/frames/{frame_id}/likes", post(frames::toggle_like))
        .route("/frames/{frame_id}/reports", post(reports::report_frame))
        // Notifications
        .route("/notifications", get(notifications::list_notifications))
        .route(
            "/notifications/{notification_id}",
            delete(notifications::delete_notification),
        )
        .route("/notifications/{notification_id}/seen", put(notifications::mark_seen))
        // Moderation
        .route("/reports", get(reports::list_reports))
        .route("/reports/{report_id}", get(reports::get_report).delete(reports::delete_report))
        .route("/reports/{report_id}/classify", put(reports::classify_report))
        .route("/blackLists", get(black_lists::list_black_lists))
        .route("/blackLists/expire", post(black_lists::expire_black_lists))
        .route(
            "/blackLists/{black_list_id}",
            get(black_lists::get_black_list)
                .put(black_lists::update_black_list)
                .delete(black_lists::delete_black_list),
        )
        // Beta keys and tickets
        .route("/betaKeys", get(beta_keys::list_beta_keys).post(beta_keys::create_beta_key))
        .route("/betaKeys/{key_id}", delete(beta_keys::delete_beta_key))
        .route("/tickets", get(tickets::list_tickets).post(tickets::create_ticket))
        .route("/tickets/{ticket_id}", delete(tickets::delete_ticket))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(trusted_routes)
        .merge(protected_routes)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Request, StatusCode, header},
        response::Response,
    };
    use chrono::{Duration, Utc};
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use galeries_db::Database;
    use galeries_db::models::UserRow;
    use galeries_db::users::NewUser;
    use galeries_types::models::Role;

    use super::*;
    use crate::auth::hash_password;
    use crate::middleware::NOTIFICATION_TOKEN_HEADER;
    use crate::state::AppStateInner;
    use crate::tokens::TokenKeys;

    const PASSWORD: &str = "Passw0rdz";

    fn state() -> AppState {
        Arc::new(AppStateInner {
            db: Database::open_in_memory().unwrap(),
            keys: TokenKeys::from_secret(b"router-test-secret"),
            secure_cookies: false,
        })
    }

    fn add_user(state: &AppState, name: &str, role: Role) -> UserRow {
        let new = NewUser {
            user_name: name.to_string(),
            pseudonym: name.to_string(),
            email: format!("{}@galeries.test", name),
            password_hash: hash_password(PASSWORD).unwrap(),
        };
        state.db.insert_user(&new, role, Utc::now()).unwrap()
    }

    fn bearer(state: &AppState, user: &UserRow) -> String {
        format!("Bearer {}", state.keys.issue_access(user).unwrap())
    }

    async fn send(state: &AppState, req: Request<Body>) -> (StatusCode, Value) {
        let resp: Response = router(state.clone()).oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
        };
        (status, body)
    }

    fn json_request(method: &str, uri: &str, auth: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(auth) = auth {
            builder = builder.header(header::AUTHORIZATION, auth);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn empty_request(method: &str, uri: &str, auth: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, auth)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn health_is_public() {
        let state = state();
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (status, body) = send(&state, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, Value::String("ok".into()));
    }

    #[tokio::test]
    async fn protected_routes_need_a_token() {
        let state = state();
        let req = Request::builder().uri("/users/me").body(Body::empty()).unwrap();
        let (status, body) = send(&state, req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["errors"], "not authenticated");
    }

    #[tokio::test]
    async fn signup_reports_field_errors() {
        let state = state();
        let req = json_request(
            "POST",
            "/users/signup",
            None,
            json!({
                "user_name": "a",
                "pseudonym": "Alice",
                "email": "nope",
                "password": "Passw0rdz",
                "beta_key": "KEY"
            }),
        );
        let (status, body) = send(&state, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"]["user_name"], "should have at least 3 characters");
        assert_eq!(body["errors"]["email"], "should be a valid email");
    }

    #[tokio::test]
    async fn signup_with_beta_key_then_login() {
        let state = state();
        let admin = add_user(&state, "admin", Role::Admin);
        state.db.create_beta_key("KEY-1", None, Some(&admin.id), Utc::now()).unwrap();

        let req = json_request(
            "POST",
            "/users/signup",
            None,
            json!({
                "user_name": "alice",
                "pseudonym": "Alice",
                "email": "alice@galeries.app",
                "password": PASSWORD,
                "beta_key": "KEY-1"
            }),
        );
        let resp = router(state.clone()).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let cookie = resp.headers()[header::SET_COOKIE].to_str().unwrap().to_string();
        assert!(cookie.starts_with("refreshToken="));
        assert!(cookie.contains("HttpOnly"));

        let req = json_request(
            "POST",
            "/users/login",
            None,
            json!({ "user_name_or_email": "alice@galeries.app", "password": PASSWORD }),
        );
        let (status, body) = send(&state, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["action"], "POST");
        assert_eq!(body["data"]["user"]["user_name"], "alice");

        // The key's creator hears about it.
        let (status, body) = send(&state, empty_request("GET", "/notifications", &bearer(&state, &admin))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"][0]["type"], "BETA_KEY_USED");
    }

    #[tokio::test]
    async fn wrong_password_is_rejected() {
        let state = state();
        add_user(&state, "alice", Role::User);

        let req = json_request(
            "POST",
            "/users/login",
            None,
            json!({ "user_name_or_email": "alice", "password": "Wrong1234" }),
        );
        let (status, _) = send(&state, req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn likes_aggregate_into_one_notification() {
        let state = state();
        let author = add_user(&state, "author", Role::User);
        let a = add_user(&state, "a", Role::User);
        let c = add_user(&state, "c", Role::User);

        let galerie = state.db.create_galerie("trip", None, &author.id, Utc::now()).unwrap();
        for user in [&a, &c] {
            state
                .db
                .add_galerie_member(&galerie.id, &user.id, galeries_types::models::GalerieRole::User, Utc::now())
                .unwrap();
        }
        let frame = state.db.post_frame(&galerie.id, &author.id, None, Utc::now()).unwrap();
        let like_uri = format!("/frames/{}/likes", frame.id);

        let (status, body) = send(&state, empty_request("POST", &like_uri, &bearer(&state, &a))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["liked"], true);
        send(&state, empty_request("POST", &like_uri, &bearer(&state, &c))).await;

        let (_, body) = send(&state, empty_request("GET", "/notifications", &bearer(&state, &author))).await;
        let notifications = body["data"].as_array().unwrap();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0]["type"], "FRAME_LIKED");
        assert_eq!(notifications[0]["num"], 2);

        // Both un-like: the row goes away.
        let (_, body) = send(&state, empty_request("POST", &like_uri, &bearer(&state, &a))).await;
        assert_eq!(body["data"]["liked"], false);
        assert_eq!(body["data"]["num_of_likes"], 1);
        send(&state, empty_request("POST", &like_uri, &bearer(&state, &c))).await;

        let (_, body) = send(&state, empty_request("GET", "/notifications", &bearer(&state, &author))).await;
        assert!(body["data"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn outsiders_cannot_see_frames() {
        let state = state();
        let author = add_user(&state, "author", Role::User);
        let stranger = add_user(&state, "stranger", Role::User);
        let galerie = state.db.create_galerie("trip", None, &author.id, Utc::now()).unwrap();
        let frame = state.db.post_frame(&galerie.id, &author.id, None, Utc::now()).unwrap();

        let uri = format!("/frames/{}/likes", frame.id);
        let (status, body) = send(&state, empty_request("POST", &uri, &bearer(&state, &stranger))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["errors"], "frame not found");
    }

    #[tokio::test]
    async fn black_listed_users_are_locked_out_until_expiry() {
        let state = state();
        let moderator = add_user(&state, "moderator", Role::Moderator);
        let alice = add_user(&state, "alice", Role::User);
        let token = bearer(&state, &alice);

        let req = json_request(
            "POST",
            &format!("/users/{}/blackLists", alice.id),
            Some(&bearer(&state, &moderator)),
            json!({ "reason": "spam", "expires_in_hours": 1 }),
        );
        let (status, body) = send(&state, req).await;
        assert_eq!(status, StatusCode::CREATED);
        let black_list_id = body["data"]["id"].as_str().unwrap().to_string();

        let (status, body) = send(&state, empty_request("GET", "/users/me", &token)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["errors"], "you are black listed");

        // Once the expiry passes, the next request lifts it lazily.
        let later = Utc::now() + Duration::hours(2);
        assert!(!state.db.check_black_list(&alice.id, later).unwrap());
        assert!(state.db.get_black_list(&black_list_id, later).unwrap().is_none());

        let (status, body) = send(&state, empty_request("GET", "/users/me", &token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["user_name"], "alice");
    }

    #[tokio::test]
    async fn moderators_cannot_black_list_peers() {
        let state = state();
        let moderator = add_user(&state, "moderator", Role::Moderator);
        let other = add_user(&state, "other", Role::Moderator);

        let req = json_request(
            "POST",
            &format!("/users/{}/blackLists", other.id),
            Some(&bearer(&state, &moderator)),
            json!({ "reason": "spam" }),
        );
        let (status, _) = send(&state, req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn oversized_expiries_are_field_errors() {
        let state = state();
        let moderator = add_user(&state, "moderator", Role::Moderator);
        let alice = add_user(&state, "alice", Role::User);
        let auth = bearer(&state, &moderator);
        let black_lists = format!("/users/{}/blackLists", alice.id);

        for hours in [1_000_000_000_000_i64, i64::MAX] {
            let req = json_request("POST", &black_lists, Some(&auth), json!({ "reason": "spam", "expires_in_hours": hours }));
            let (status, body) = send(&state, req).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["errors"]["expires_in_hours"], "should be at most 87600 hours");
        }
        assert!(!state.db.check_black_list(&alice.id, Utc::now()).unwrap());

        let req = json_request("POST", &black_lists, Some(&auth), json!({ "reason": "spam", "expires_in_hours": 1 }));
        let (status, body) = send(&state, req).await;
        assert_eq!(status, StatusCode::CREATED);
        let black_list_id = body["data"]["id"].as_str().unwrap().to_string();

        let req = json_request(
            "PUT",
            &format!("/blackLists/{}", black_list_id),
            Some(&auth),
            json!({ "expires_in_hours": i64::MAX }),
        );
        let (status, body) = send(&state, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"]["expires_in_hours"], "should be at most 87600 hours");

        let galerie = state.db.create_galerie("Holidays", None, &alice.id, Utc::now()).unwrap();
        let req = json_request(
            "POST",
            &format!("/galeries/{}/invitations", galerie.id),
            Some(&bearer(&state, &alice)),
            json!({ "num_of_invits": 1, "expires_in_hours": i64::MAX }),
        );
        let (status, body) = send(&state, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"]["expires_in_hours"], "should be at most 87600 hours");
    }

    #[tokio::test]
    async fn black_list_update_can_drop_the_expiry() {
        let state = state();
        let moderator = add_user(&state, "moderator", Role::Moderator);
        let alice = add_user(&state, "alice", Role::User);
        let auth = bearer(&state, &moderator);

        let req = json_request(
            "POST",
            &format!("/users/{}/blackLists", alice.id),
            Some(&auth),
            json!({ "reason": "spam", "expires_in_hours": 1 }),
        );
        let (status, body) = send(&state, req).await;
        assert_eq!(status, StatusCode::CREATED);
        let uri = format!("/blackLists/{}", body["data"]["id"].as_str().unwrap());

        let req = json_request("PUT", &uri, Some(&auth), json!({ "permanent": true, "expires_in_hours": 2 }));
        let (status, body) = send(&state, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"]["permanent"], "cannot be combined with expires_in_hours");

        let req = json_request("PUT", &uri, Some(&auth), json!({ "permanent": true }));
        let (status, body) = send(&state, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["time"], Value::Null);
        assert!(state.db.check_black_list(&alice.id, Utc::now() + Duration::days(365)).unwrap());
    }

    #[tokio::test]
    async fn second_report_after_classification_is_rejected() {
        let state = state();
        let owner = add_user(&state, "owner", Role::User);
        let a = add_user(&state, "a", Role::User);
        let b = add_user(&state, "b", Role::User);
        let moderator = add_user(&state, "moderator", Role::Moderator);
        let picture = state.db.create_profile_picture(&owner.id, Utc::now()).unwrap();
        let uri = format!("/profilePictures/{}/reports", picture.id);

        let (status, body) = send(&state, json_request("POST", &uri, Some(&bearer(&state, &a)), json!({}))).await;
        assert_eq!(status, StatusCode::CREATED);
        let report_id = body["data"]["id"].as_str().unwrap().to_string();

        let (status, body) = send(&state, json_request("POST", &uri, Some(&bearer(&state, &a)), json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"], "you have already reported this profile picture");

        let classify = format!("/reports/{}/classify", report_id);
        let (status, _) = send(&state, empty_request("PUT", &classify, &bearer(&state, &moderator))).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(&state, json_request("POST", &uri, Some(&bearer(&state, &b)), json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"], "this report has already been classed");

        let (status, body) = send(&state, empty_request("PUT", &classify, &bearer(&state, &moderator))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"], "this report has already been classed");
    }

    #[tokio::test]
    async fn plain_users_cannot_moderate() {
        let state = state();
        let alice = add_user(&state, "alice", Role::User);
        let (status, _) = send(&state, empty_request("GET", "/reports", &bearer(&state, &alice))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn trusted_post_requires_notification_token() {
        let state = state();
        let alice = add_user(&state, "alice", Role::User);
        let event = json!({ "type": "FRAME_POSTED", "frame_id": uuid::Uuid::new_v4() });

        // A user's access token is not a notification token.
        let req = Request::builder()
            .method("POST")
            .uri("/notifications")
            .header(header::CONTENT_TYPE, "application/json")
            .header(NOTIFICATION_TOKEN_HEADER, state.keys.issue_access(&alice).unwrap())
            .body(Body::from(event.to_string()))
            .unwrap();
        let (status, _) = send(&state, req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        // Valid token, unknown frame.
        let req = Request::builder()
            .method("POST")
            .uri("/notifications")
            .header(header::CONTENT_TYPE, "application/json")
            .header(NOTIFICATION_TOKEN_HEADER, state.keys.issue_notification().unwrap())
            .body(Body::from(event.to_string()))
            .unwrap();
        let (status, body) = send(&state, req).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["errors"], "resource not found");
    }

    #[tokio::test]
    async fn trusted_post_notifies_members() {
        let state = state();
        let author = add_user(&state, "author", Role::User);
        let member = add_user(&state, "member", Role::User);
        let galerie = state.db.create_galerie("trip", None, &author.id, Utc::now()).unwrap();
        state
            .db
            .add_galerie_member(&galerie.id, &member.id, galeries_types::models::GalerieRole::User, Utc::now())
            .unwrap();

        // Posting already notified the member; clear it so the trusted post is
        // the only source.
        let frame = state.db.post_frame(&galerie.id, &author.id, None, Utc::now()).unwrap();
        let notifications = state.db.list_notifications(&member.id).unwrap();
        for n in &notifications {
            state.db.delete_notification(&n.id, &member.id).unwrap();
        }

        let event = json!({ "type": "FRAME_POSTED", "frame_id": frame.id });
        let req = Request::builder()
            .method("POST")
            .uri("/notifications")
            .header(header::CONTENT_TYPE, "application/json")
            .header(NOTIFICATION_TOKEN_HEADER, state.keys.issue_notification().unwrap())
            .body(Body::from(event.to_string()))
            .unwrap();
        let (status, body) = send(&state, req).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["recipients"], 1);
        assert_eq!(state.db.list_notifications(&member.id).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn galerie_flow_with_invitation() {
        let state = state();
        let creator = add_user(&state, "creator", Role::User);
        let joiner = add_user(&state, "joiner", Role::User);

        let req = json_request(
            "POST",
            "/galeries",
            Some(&bearer(&state, &creator)),
            json!({ "name": "Holidays", "description": null }),
        );
        let (status, body) = send(&state, req).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["role"], "creator");
        let galerie_id = body["data"]["id"].as_str().unwrap().to_string();

        let req = json_request(
            "POST",
            &format!("/galeries/{}/invitations", galerie_id),
            Some(&bearer(&state, &creator)),
            json!({ "num_of_invits": 1, "expires_in_hours": null }),
        );
        let (status, body) = send(&state, req).await;
        assert_eq!(status, StatusCode::CREATED);
        let code = body["data"]["code"].as_str().unwrap().to_string();

        let subscribe = format!("/galeries/subscribe/{}", code);
        let (status, body) = send(&state, empty_request("POST", &subscribe, &bearer(&state, &joiner))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["role"], "user");

        // The creator is told someone joined.
        let notifications = state.db.list_notifications(&creator.id).unwrap();
        assert_eq!(notifications.len(), 1);

        // Creator cannot leave; the joiner can.
        let leave = format!("/galeries/{}/leave", galerie_id);
        let (status, _) = send(&state, empty_request("POST", &leave, &bearer(&state, &creator))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = send(&state, empty_request("POST", &leave, &bearer(&state, &joiner))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(state.db.list_notifications(&creator.id).unwrap().is_empty());
    }
}
