#[cfg(test)]
mod tests {
    use rocket::http::{ContentType, Status};
    use rocket::local::asynchronous::Client;
    use serde_json::{Value, json};

    use crate::models::Side;
    use crate::test::test_db::TestDbBuilder;
    use crate::test::test_utils::{
        create_standard_test_db, json_body, login_test_user, setup_test_client,
    };

    async fn post_attendance(client: &Client, records: Value) -> Status {
        client
            .post("/api/attendance")
            .header(ContentType::JSON)
            .body(records.to_string())
            .dispatch()
            .await
            .status()
    }

    #[rocket::async_test]
    async fn test_attendance_round_trip_for_new_client() {
        let (client, _, test_db) = setup_test_client(create_standard_test_db().await).await;
        assert_eq!(login_test_user(&client, "staff_user").await, Status::Ok);

        let response = client
            .post("/api/clients")
            .header(ContentType::JSON)
            .body(
                json!({
                    "clientData": { "fname": "Jo", "lname": "Lee", "side": "One", "status": "Active" },
                    "startDate": "2024-01-01"
                })
                .to_string(),
            )
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Created);
        let cid = json_body(response).await["data"]["id"].as_i64().unwrap();

        let response = client
            .get("/api/attendance?date=2024-01-01&side=One")
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let body = json_body(response).await;
        assert_eq!(
            body["data"],
            json!([{ "cid": cid, "fname": "Jo", "lname": "Lee", "attendance_status": null }])
        );

        let status = post_attendance(
            &client,
            json!([{ "cid": cid, "attendance_date": "2024-01-01", "attendance_status": "Absent" }]),
        )
        .await;
        assert_eq!(status, Status::NoContent);

        let body = json_body(
            client
                .get("/api/attendance?date=2024-01-01&side=One")
                .dispatch()
                .await,
        )
        .await;
        assert_eq!(body["data"][0]["attendance_status"], "Absent");

        let response = client
            .get(format!("/api/attendance/client?month=2024-01&cid={}", cid))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let body = json_body(response).await;
        assert_eq!(body["data"], json!({ "2024-01-01": "Absent" }));

        let body = json_body(
            client
                .get("/api/attendance?date=2024-01-01&side=Two")
                .dispatch()
                .await,
        )
        .await;
        assert_eq!(body["data"], json!([]));
        assert_eq!(test_db.count("attendance").await, 1);
    }

    #[rocket::async_test]
    async fn test_attendance_query_validation() {
        let (client, _, _) = setup_test_client(create_standard_test_db().await).await;
        assert_eq!(login_test_user(&client, "staff_user").await, Status::Ok);

        for uri in [
            "/api/attendance",
            "/api/attendance?date=2024-01-01",
            "/api/attendance?side=One",
            "/api/attendance?date=01/02/2024&side=One",
            "/api/attendance?date=2024-01-01&side=Three",
            "/api/attendance/client?month=2024-13&cid=1",
            "/api/attendance/client?month=2024-1&cid=1",
            "/api/attendance/client?month=2024-01&cid=zero",
            "/api/attendance/client?month=2024-01",
        ] {
            let response = client.get(uri).dispatch().await;
            assert_eq!(response.status(), Status::BadRequest, "{}", uri);
            let body = json_body(response).await;
            assert_eq!(body["message"], "query validation failed", "{}", uri);
            assert!(body["errors"].is_object(), "{}", uri);
        }
    }

    #[rocket::async_test]
    async fn test_upsert_validation_and_atomicity() {
        let test_db = TestDbBuilder::new()
            .staff("staff_user")
            .client("Jo", "Lee", Side::One)
            .roster("Jo", "2024-01-01", None)
            .build()
            .await
            .unwrap();
        let (client, _, test_db) = setup_test_client(test_db).await;
        assert_eq!(login_test_user(&client, "staff_user").await, Status::Ok);
        let cid = test_db.client_id("Jo");

        let status = post_attendance(
            &client,
            json!([{ "cid": cid, "attendance_date": "2024-01-02", "attendance_status": "Late" }]),
        )
        .await;
        assert_eq!(status, Status::BadRequest);

        let status = post_attendance(
            &client,
            json!([
                { "cid": cid, "attendance_date": "2024-01-02", "attendance_status": "Here" },
                { "cid": 0, "attendance_date": "2024-01-02", "attendance_status": "Here" }
            ]),
        )
        .await;
        assert_eq!(status, Status::BadRequest);

        let status = post_attendance(
            &client,
            json!([
                { "cid": cid, "attendance_date": "2024-01-02", "attendance_status": "Here" },
                { "cid": 9999, "attendance_date": "2024-01-02", "attendance_status": "Here" }
            ]),
        )
        .await;
        assert_eq!(status, Status::InternalServerError);
        assert_eq!(test_db.count("attendance").await, 0);
    }

    #[rocket::async_test]
    async fn test_upsert_is_idempotent() {
        let test_db = TestDbBuilder::new()
            .staff("staff_user")
            .client("Jo", "Lee", Side::One)
            .roster("Jo", "2024-01-01", None)
            .build()
            .await
            .unwrap();
        let (client, _, test_db) = setup_test_client(test_db).await;
        assert_eq!(login_test_user(&client, "staff_user").await, Status::Ok);
        let cid = test_db.client_id("Jo");

        let records = json!([
            { "cid": cid, "attendance_date": "2024-01-02", "attendance_status": "Here" },
            { "cid": cid, "attendance_date": "2024-01-03", "attendance_status": "Not Scheduled" }
        ]);
        assert_eq!(post_attendance(&client, records.clone()).await, Status::NoContent);
        assert_eq!(post_attendance(&client, records).await, Status::NoContent);
        assert_eq!(test_db.count("attendance").await, 2);

        let status = post_attendance(
            &client,
            json!([{ "cid": cid, "attendance_date": "2024-01-02", "attendance_status": "Absent" }]),
        )
        .await;
        assert_eq!(status, Status::NoContent);

        let body = json_body(
            client
                .get(format!("/api/attendance/client?month=2024-01&cid={}", cid))
                .dispatch()
                .await,
        )
        .await;
        assert_eq!(
            body["data"],
            json!({ "2024-01-02": "Absent", "2024-01-03": "Not Scheduled" })
        );
    }

    #[rocket::async_test]
    async fn test_client_attendance_for_month_without_records() {
        let test_db = TestDbBuilder::new()
            .staff("staff_user")
            .client("Jo", "Lee", Side::One)
            .build()
            .await
            .unwrap();
        let (client, _, test_db) = setup_test_client(test_db).await;
        assert_eq!(login_test_user(&client, "staff_user").await, Status::Ok);

        let body = json_body(
            client
                .get(format!(
                    "/api/attendance/client?month=2023-12&cid={}",
                    test_db.client_id("Jo")
                ))
                .dispatch()
                .await,
        )
        .await;
        assert_eq!(body["data"], json!({}));
    }

    #[rocket::async_test]
    async fn test_attendance_requires_session() {
        let (client, _, _) = setup_test_client(create_standard_test_db().await).await;

        let response = client
            .get("/api/attendance?date=2024-01-01&side=One")
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Unauthorized);

        let status = post_attendance(&client, json!([])).await;
        assert_eq!(status, Status::Unauthorized);
    }
}
