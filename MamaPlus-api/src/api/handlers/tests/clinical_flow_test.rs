use axum::http::{Method, StatusCode};
use chrono::Utc;
use serde_json::json;

use super::{send, test_app, token_for};

async fn create_patiente(app: &axum::Router, token: &str) -> i64 {
    let (status, patiente) = send(
        app,
        Method::POST,
        "/api/patientes",
        Some(token),
        Some(json!({ "nom": "Coulibaly", "prenom": "Salimata", "age": 17, "gestite": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    patiente["id"].as_i64().unwrap()
}

#[tokio::test]
async fn test_calendar_reminders_and_consultation() {
    let app = test_app().await;
    let staff = token_for(&app, "71000001", "professionnel").await;
    let patiente_id = create_patiente(&app, &staff).await;

    let today = Utc::now().date_naive();
    let (status, created) = send(
        &app,
        Method::POST,
        "/api/cpn/generate",
        Some(&staff),
        Some(json!({
            "patiente_id": patiente_id,
            "date_premiere_cpn": today.to_string(),
            "semaine_grossesse": 12,
            "nombre_cpn": 4
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let created = created.as_array().unwrap().clone();
    assert_eq!(created.len(), 4);
    assert_eq!(created[0]["numero_cpn"], 1);
    assert_eq!(created[3]["semaine_grossesse"], 24);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/cpn/generate",
        Some(&staff),
        Some(json!({
            "patiente_id": patiente_id,
            "date_premiere_cpn": today.to_string(),
            "semaine_grossesse": 12,
            "nombre_cpn": 6
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, listed) = send(
        &app,
        Method::GET,
        &format!("/api/cpn?statut=planifie&patiente_id={}", patiente_id),
        Some(&staff),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 4);
    assert_eq!(listed[0]["patiente"]["prenom"], "Salimata");

    let (status, _) = send(&app, Method::GET, "/api/cpn?statut=bogus", Some(&staff), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let cpn_id = created[0]["id"].as_i64().unwrap();
    let (status, rappels) = send(
        &app,
        Method::POST,
        &format!("/api/cpn/{}/rappels", cpn_id),
        Some(&staff),
        Some(json!({ "types": ["sms", "appel"] })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(rappels.as_array().unwrap().len(), 2);

    let (_, cpn) = send(&app, Method::GET, &format!("/api/cpn/{}", cpn_id), Some(&staff), None).await;
    assert_eq!(cpn["rappel_envoye"], true);

    let (status, listed) = send(&app, Method::GET, &format!("/api/cpn/{}/rappels", cpn_id), Some(&staff), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 2);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/consultations",
        Some(&staff),
        Some(json!({ "patiente_id": patiente_id, "poids": 10.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["details"]["poids"].is_string());

    let (status, consultation) = send(
        &app,
        Method::POST,
        "/api/consultations",
        Some(&staff),
        Some(json!({
            "patiente_id": patiente_id,
            "cpn_id": cpn_id,
            "poids": 58.0,
            "tension_arterielle_systolique": 145,
            "tension_arterielle_diastolique": 95
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let consultation_id = consultation["id"].as_i64().unwrap();

    let (_, cpn) = send(&app, Method::GET, &format!("/api/cpn/{}", cpn_id), Some(&staff), None).await;
    assert_eq!(cpn["statut"], "complete");

    let (status, fetched) = send(
        &app,
        Method::GET,
        &format!("/api/consultations/{}", consultation_id),
        Some(&staff),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["tension_arterielle_systolique"], 145);

    let (status, vaccination) = send(
        &app,
        Method::POST,
        "/api/vaccinations",
        Some(&staff),
        Some(json!({ "patiente_id": patiente_id, "type_vaccin": "VAT1", "date_vaccination": today.to_string() })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, listed) = send(
        &app,
        Method::GET,
        &format!("/api/vaccinations?patiente_id={}", patiente_id),
        Some(&staff),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed[0]["id"], vaccination["id"]);

    let (status, stats) = send(&app, Method::GET, "/api/dashboard/stats", Some(&staff), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total_patientes"], 1);
    assert_eq!(stats["cpn_planifiees"], 3);
    assert_eq!(stats["vaccinations_total"], 1);
    assert_eq!(stats["rappels_envoyes"], 2);

    let (status, overview) = send(&app, Method::GET, "/api/dashboard/patientes", Some(&staff), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(overview[0]["prochaine_cpn"]["numero_cpn"], 2);

    let (status, prediction) = send(
        &app,
        Method::GET,
        &format!("/api/prediction/patientes/{}", patiente_id),
        Some(&staff),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(prediction["available"], true);
    let score = prediction["risk_score"].as_f64().unwrap();
    assert!((0.0..=1.0).contains(&score));

    let (status, risks) = send(&app, Method::GET, "/api/prediction/patientes/risks", Some(&staff), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(risks["patientes"][0]["patiente_id"], patiente_id);
}

#[tokio::test]
async fn test_cpn_update_and_unknown_ids() {
    let app = test_app().await;
    let staff = token_for(&app, "71000002", "professionnel").await;
    let patiente_id = create_patiente(&app, &staff).await;

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/cpn",
        Some(&staff),
        Some(json!({ "patiente_id": 999, "numero_cpn": 1, "date_rdv": "2030-01-10T08:00:00Z" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, cpn) = send(
        &app,
        Method::POST,
        "/api/cpn",
        Some(&staff),
        Some(json!({ "patiente_id": patiente_id, "numero_cpn": 2, "date_rdv": "2030-01-10T08:00:00Z" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let cpn_id = cpn["id"].as_i64().unwrap();

    let (status, updated) = send(
        &app,
        Method::PUT,
        &format!("/api/cpn/{}", cpn_id),
        Some(&staff),
        Some(json!({ "statut": "annulee", "notes": "Déplacement" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["statut"], "annulee");
    assert_eq!(updated["notes"], "Déplacement");

    for uri in ["/api/cpn/999", "/api/consultations/999", "/api/vaccinations/999"] {
        let (status, body) = send(&app, Method::GET, uri, Some(&staff), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{}", uri);
        assert_eq!(body["error"], "not_found");
    }

    let (status, _) = send(&app, Method::GET, "/api/cpn/abc", Some(&staff), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_chatbot_is_public() {
    let app = test_app().await;
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/chatbot/messages",
        None,
        Some(json!({ "numero_expediteur": "+22370000000", "message_recu": "J'ai un saignement" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["alerte"], true);
    assert_eq!(body["categorie"], "saignement");
    assert_eq!(body["langue"], "fr");

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/chatbot/messages",
        None,
        Some(json!({ "numero_expediteur": "+22370000000", "message_recu": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn test_scheduler_routes() {
    let app = test_app().await;
    let staff = token_for(&app, "71000003", "professionnel").await;

    let (status, status_body) = send(&app, Method::GET, "/api/scheduler/status", Some(&staff), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(status_body["running"], false);

    let (status, summary) = send(&app, Method::POST, "/api/scheduler/run", Some(&staff), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["rappels_envoyes"], 0);
    assert_eq!(summary["cpn_manquees"], 0);
}

#[tokio::test]
async fn test_out_of_range_dates_are_rejected() {
    let app = test_app().await;
    let staff = token_for(&app, "71000003", "professionnel").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/patientes",
        Some(&staff),
        Some(json!({
            "nom": "Diarra",
            "age": 25,
            "gestite": 1,
            "date_dernieres_regles": "+262142-12-01"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let patiente_id = create_patiente(&app, &staff).await;
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/cpn/generate",
        Some(&staff),
        Some(json!({
            "patiente_id": patiente_id,
            "date_premiere_cpn": "+262142-12-01",
            "semaine_grossesse": 12,
            "nombre_cpn": 8
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, listed) = send(
        &app,
        Method::GET,
        &format!("/api/cpn?patiente_id={}", patiente_id),
        Some(&staff),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(listed.as_array().unwrap().is_empty());
}
