//! HTTP client tests against an in-process fake backend.

use std::time::Duration;

use axum::extract::Path;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};

use peds_dose_api::{
    sample_catalog, sample_details, sample_result, ApiEnvelope, ApiError, CalculationRequest,
    CalculationResult, Concentration, DoseApi, DrugDetail, DrugListData, Gender, HttpDoseApi,
    PatientData, REQUEST_ID_HEADER,
};

async fn spawn_backend(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

fn backend() -> Router {
    Router::new()
        .route(
            "/api/drugs",
            get(|| async {
                Json(ApiEnvelope::ok(DrugListData {
                    drugs: sample_catalog(),
                }))
            }),
        )
        .route(
            "/api/drugs/:id",
            get(|Path(id): Path<String>| async move {
                let detail = sample_details().into_iter().find(|d| d.drug.id == id);
                match detail {
                    Some(detail) => (StatusCode::OK, Json(ApiEnvelope::ok(detail))),
                    None => (
                        StatusCode::NOT_FOUND,
                        Json(ApiEnvelope::<DrugDetail>::failure(Some(format!(
                            "unknown drug {}",
                            id
                        )))),
                    ),
                }
            }),
        )
        .route(
            "/api/calculations",
            post(|Json(request): Json<CalculationRequest>| async move {
                if request.patient_data.weight > 0.0 && request.frequency.as_str() == "q6h" {
                    Json(ApiEnvelope::ok(sample_result()))
                } else {
                    Json(ApiEnvelope::<CalculationResult>::failure(Some(
                        "unsupported frequency".into(),
                    )))
                }
            }),
        )
}

fn request(frequency: &str) -> CalculationRequest {
    CalculationRequest {
        patient_data: PatientData {
            age_years: 2.0,
            age_months: 6,
            weight: 12.0,
            gender: Some(Gender::Male),
        },
        drug_id: "paracetamol-syrup".into(),
        concentration: Concentration::new(120.0, 5.0),
        frequency: frequency.into(),
    }
}

#[tokio::test]
async fn test_list_drugs() {
    let base = spawn_backend(backend()).await;
    let api = HttpDoseApi::new(&base, 5).unwrap();

    let drugs = api.list_drugs().await.unwrap();
    assert_eq!(drugs, sample_catalog());
}

#[tokio::test]
async fn test_drug_detail() {
    let base = spawn_backend(backend()).await;
    let api = HttpDoseApi::new(&base, 5).unwrap();

    let detail = api.drug_detail("ibuprofen-suspension").await.unwrap();
    assert_eq!(detail.drug.generic_name, "Ibuprofen");
    assert_eq!(detail.frequencies().len(), 2);
}

#[tokio::test]
async fn test_unknown_drug_surfaces_server_message() {
    let base = spawn_backend(backend()).await;
    let api = HttpDoseApi::new(&base, 5).unwrap();

    let err = api.drug_detail("nope").await.unwrap_err();
    assert_eq!(
        err,
        ApiError::Rejected {
            status: Some(404),
            message: "unknown drug nope".into(),
        }
    );
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_calculate_success() {
    let base = spawn_backend(backend()).await;
    let api = HttpDoseApi::new(&base, 5).unwrap();

    let result = api.calculate(&request("q6h")).await.unwrap();
    assert_eq!(result.calculation.dose_in_mg, 180.0);
    assert_eq!(result.calculation.volume_in_ml, 7.5);
}

#[tokio::test]
async fn test_calculate_rejected() {
    let base = spawn_backend(backend()).await;
    let api = HttpDoseApi::new(&base, 5).unwrap();

    let err = api.calculate(&request("q12h")).await.unwrap_err();
    assert_eq!(err, ApiError::rejected("unsupported frequency"));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_calculate_bad_request_is_not_retryable() {
    let router = Router::new().route(
        "/api/calculations",
        post(|| async {
            (
                StatusCode::BAD_REQUEST,
                Json(ApiEnvelope::<CalculationResult>::failure(Some(
                    "weight out of range".into(),
                ))),
            )
        }),
    );
    let base = spawn_backend(router).await;
    let api = HttpDoseApi::new(&base, 5).unwrap();

    let err = api.calculate(&request("q6h")).await.unwrap_err();
    assert_eq!(
        err,
        ApiError::Rejected {
            status: Some(400),
            message: "weight out of range".into(),
        }
    );
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_server_error_status() {
    let router = Router::new().route(
        "/api/drugs",
        get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "database down") }),
    );
    let base = spawn_backend(router).await;
    let api = HttpDoseApi::new(&base, 5).unwrap();

    let err = api.list_drugs().await.unwrap_err();
    assert_eq!(
        err,
        ApiError::Http {
            status: 500,
            body: "database down".into()
        }
    );
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_malformed_body() {
    let router = Router::new().route("/api/drugs", get(|| async { "<html>login</html>" }));
    let base = spawn_backend(router).await;
    let api = HttpDoseApi::new(&base, 5).unwrap();

    let err = api.list_drugs().await.unwrap_err();
    assert!(matches!(err, ApiError::Decode(_)));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_request_id_header_sent() {
    let router = Router::new().route(
        "/api/drugs",
        get(|headers: HeaderMap| async move {
            let has_id = headers
                .get(REQUEST_ID_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(|v| uuid_like(v))
                .unwrap_or(false);
            let drugs = if has_id { sample_catalog() } else { Vec::new() };
            Json(ApiEnvelope::ok(DrugListData { drugs }))
        }),
    );
    let base = spawn_backend(router).await;
    let api = HttpDoseApi::new(&base, 5).unwrap();

    assert_eq!(api.list_drugs().await.unwrap().len(), 3);
}

fn uuid_like(value: &str) -> bool {
    value.len() == 36 && value.chars().filter(|c| *c == '-').count() == 4
}

#[tokio::test]
async fn test_timeout() {
    let router = Router::new().route(
        "/api/calculations",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(3)).await;
            Json(ApiEnvelope::ok(sample_result()))
        }),
    );
    let base = spawn_backend(router).await;
    let api = HttpDoseApi::new(&base, 1).unwrap();

    let err = api.calculate(&request("q6h")).await.unwrap_err();
    assert_eq!(err, ApiError::Timeout(1));
}

#[tokio::test]
async fn test_connection_refused() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let base = format!("http://{}", addr);
    let api = HttpDoseApi::new(&base, 2).unwrap();

    let err = api.list_drugs().await.unwrap_err();
    assert_eq!(err, ApiError::Connection(base));
    assert!(err.is_retryable());
}
