pub mod cors;
pub mod micropost;
pub mod relationship;
pub mod user;

use actix_web::web;

pub fn api(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(web::scope("/user").configure(user::config))
            .service(web::scope("/relationship").configure(relationship::config))
            .service(web::scope("/micropost").configure(micropost::config)),
    );
}

#[cfg(test)]
mod tests {
    use actix_web::{test, web, App};
    use chrono::{Duration, Utc};
    use serde_json::{json, Value};

    use crate::config::AppConfig;
    use crate::credential::testing::fast_bcrypt;
    use crate::db::testing::memory_db;
    use crate::response::json_error_handler;

    macro_rules! call {
        ($app:expr, $path:expr, $token:expr, $body:expr) => {{
            let mut req = test::TestRequest::post().uri($path).set_json($body);
            let token: Option<&str> = $token;
            if let Some(token) = token {
                req = req.insert_header(("token", token));
            }
            let res: Value = test::call_and_read_body_json($app, req.to_request()).await;
            res
        }};
    }

    macro_rules! register_and_login {
        ($app:expr, $name:expr, $email:expr) => {{
            let body = json!({"name": $name, "email": $email, "password": "foobar"});
            let res = call!($app, "/api/user/register", None, body);
            assert_eq!(res["code"], 0, "{}", res);
            let body = json!({"email": $email, "password": "foobar"});
            let res = call!($app, "/api/user/login", None, body);
            assert_eq!(res["code"], 0, "{}", res);
            (
                res["data"]["userId"].as_i64().unwrap(),
                res["data"]["token"].as_str().unwrap().to_string(),
            )
        }};
    }

    macro_rules! app {
        () => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new(AppConfig::for_test()))
                    .app_data(web::Data::new(memory_db().await))
                    .app_data(web::Data::new(fast_bcrypt()))
                    .app_data(web::JsonConfig::default().error_handler(json_error_handler))
                    .configure(super::api),
            )
            .await
        };
    }

    #[actix_rt::test]
    async fn register_reports_field_errors() {
        let app = app!();
        let body = json!({"name": "", "email": "bad", "password": "123"});
        let res = call!(&app, "/api/user/register", None, body);
        assert_eq!(res["code"], 1);
        let fields: Vec<&str> = res["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["field"].as_str().unwrap())
            .collect();
        assert_eq!(fields, vec!["name", "email", "password"]);
    }

    #[actix_rt::test]
    async fn login_with_remember_me_can_resume() {
        let app = app!();
        let (_, _) = register_and_login!(&app, "Ann", "ann@example.com");

        let body = json!({"email": "ANN@example.com", "password": "foobar", "rememberMe": true});
        let res = call!(&app, "/api/user/login", None, body);
        assert_eq!(res["code"], 0);
        let user_id = res["data"]["userId"].clone();
        let remember = res["data"]["rememberToken"].as_str().unwrap().to_string();
        let token = res["data"]["token"].as_str().unwrap().to_string();

        let body = json!({"userId": user_id, "rememberToken": remember});
        let res = call!(&app, "/api/user/resume", None, body.clone());
        assert_eq!(res["code"], 0);

        let res = call!(&app, "/api/user/resume", None, json!({"userId": user_id, "rememberToken": "nope"}));
        assert_eq!(res["code"], 3);

        let res = call!(&app, "/api/user/logout", Some(token.as_str()), json!({}));
        assert_eq!(res["code"], 0);
        let res = call!(&app, "/api/user/resume", None, body);
        assert_eq!(res["code"], 3);

        let res = call!(&app, "/api/user/login", None, json!({"email": "ann@example.com", "password": "wrong!"}));
        assert_eq!(res["code"], 2);
    }

    #[actix_rt::test]
    async fn follow_post_and_read_feed() {
        let app = app!();
        let (a_id, a_token) = register_and_login!(&app, "A", "a@example.com");
        let (b_id, b_token) = register_and_login!(&app, "B", "b@example.com");

        let soon = (Utc::now() + Duration::hours(2)).to_rfc3339();
        let old = (Utc::now() - Duration::days(2)).to_rfc3339();
        let res = call!(&app, "/api/micropost/save", Some(b_token.as_str()), json!({"content": "hello", "location": "Park", "eventDate": soon}));
        assert_eq!(res["code"], 0, "{}", res);
        let hello_id = res["data"].clone();
        call!(&app, "/api/micropost/save", Some(b_token.as_str()), json!({"content": "old", "eventDate": old}));

        let res = call!(&app, "/api/micropost/feed", Some(a_token.as_str()), json!({}));
        assert_eq!(res["data"]["total"], 0);

        let res = call!(&app, "/api/relationship/follow", Some(a_token.as_str()), json!({"userId": b_id}));
        assert_eq!(res["code"], 0);
        let res = call!(&app, "/api/relationship/status", Some(b_token.as_str()), json!({"userId": a_id}));
        assert_eq!(res["data"]["following"], false);
        assert_eq!(res["data"]["followedBy"], true);

        let res = call!(&app, "/api/micropost/feed", Some(a_token.as_str()), json!({"search": "hello"}));
        assert_eq!(res["data"]["total"], 1);
        assert_eq!(res["data"]["items"][0]["id"], hello_id);
        assert_eq!(res["data"]["items"][0]["attending"], false);

        let res = call!(&app, "/api/micropost/attend", Some(a_token.as_str()), json!({"micropostId": hello_id}));
        assert_eq!(res["code"], 0);
        let res = call!(&app, "/api/micropost/feed", Some(a_token.as_str()), json!({"page": 1, "size": 10}));
        assert_eq!(res["data"]["items"][0]["attending"], true);
        let res = call!(&app, "/api/micropost/attending", Some(a_token.as_str()), json!({}));
        assert_eq!(res["data"].as_array().unwrap().len(), 1);

        let res = call!(&app, "/api/relationship/unfollow", Some(a_token.as_str()), json!({"userId": b_id}));
        assert_eq!(res["code"], 0);
        let res = call!(&app, "/api/relationship/unfollow", Some(a_token.as_str()), json!({"userId": b_id}));
        assert_eq!(res["code"], 2);
        let res = call!(&app, "/api/micropost/unattend", Some(a_token.as_str()), json!({"micropostId": hello_id}));
        assert_eq!(res["code"], 0);
        let res = call!(&app, "/api/micropost/unattend", Some(a_token.as_str()), json!({"micropostId": hello_id}));
        assert_eq!(res["code"], 2);
    }

    #[actix_rt::test]
    async fn protected_routes_need_a_session() {
        let app = app!();
        let res = call!(&app, "/api/micropost/feed", None, json!({}));
        assert_eq!(res["code"], 3);
        let res = call!(&app, "/api/micropost/feed", Some("garbage"), json!({}));
        assert_eq!(res["code"], 3);
    }

    #[actix_rt::test]
    async fn remove_deletes_the_account() {
        let app = app!();
        let (a_id, a_token) = register_and_login!(&app, "A", "a@example.com");
        let (b_id, b_token) = register_and_login!(&app, "B", "b@example.com");
        let soon = (Utc::now() + Duration::hours(2)).to_rfc3339();
        let res = call!(&app, "/api/micropost/save", Some(b_token.as_str()), json!({"content": "party", "eventDate": soon}));
        let post_id = res["data"].clone();

        let res = call!(&app, "/api/user/remove", Some(a_token.as_str()), json!({}));
        assert_eq!(res["code"], 0);
        let res = call!(&app, &format!("/api/user/{}", a_id), Some(b_token.as_str()), json!({}));
        assert_eq!(res["code"], 2);

        // the session token outlives the account but can no longer add edges
        let res = call!(&app, "/api/relationship/follow", Some(a_token.as_str()), json!({"userId": b_id}));
        assert_eq!(res["code"], 2);
        let res = call!(&app, "/api/micropost/attend", Some(a_token.as_str()), json!({"micropostId": post_id}));
        assert_eq!(res["code"], 2);
        let res = call!(&app, "/api/micropost/feed", Some(b_token.as_str()), json!({}));
        assert_eq!(res["data"]["items"][0]["attendees"], 0);
    }
}
