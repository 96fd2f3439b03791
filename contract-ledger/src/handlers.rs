use crate::errors::LedgerError;
use crate::metrics;
use crate::models::{ContractId, DepositRequest, JobId, ReportQuery};
use crate::services::LedgerService;
use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::json;
use std::sync::Arc;

/// Header carrying the caller's profile id
pub const PROFILE_HEADER: &str = "profile_id";

fn profile_header(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get(PROFILE_HEADER)
        .and_then(|value| value.to_str().ok())
}

/// Health check endpoint
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "service": "contract-ledger",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Deposit into another client's balance
pub async fn deposit(
    req: HttpRequest,
    service: web::Data<Arc<LedgerService>>,
    user_id: web::Path<String>,
    body: Option<web::Json<DepositRequest>>,
) -> Result<HttpResponse, LedgerError> {
    let payer = service.resolve_client(profile_header(&req)).await?;
    let request = body.map(|b| b.into_inner()).unwrap_or_default();

    let receipt = service.deposit(&payer, &user_id, request).await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Deposit successful",
        "receipt": receipt
    })))
}

/// Pay for a job
pub async fn pay_job(
    req: HttpRequest,
    service: web::Data<Arc<LedgerService>>,
    job_id: web::Path<JobId>,
) -> Result<HttpResponse, LedgerError> {
    let client = service.resolve_client(profile_header(&req)).await?;
    let job = service.pay_job(&client, *job_id).await?;
    Ok(HttpResponse::Ok().json(job))
}

/// Unpaid jobs on the caller's active contracts
pub async fn unpaid_jobs(
    req: HttpRequest,
    service: web::Data<Arc<LedgerService>>,
) -> Result<HttpResponse, LedgerError> {
    let profile = service.resolve_profile(profile_header(&req)).await?;
    let jobs = service.list_unpaid_jobs(&profile).await?;
    Ok(HttpResponse::Ok().json(jobs))
}

/// Non-terminated contracts of the caller
pub async fn list_contracts(
    req: HttpRequest,
    service: web::Data<Arc<LedgerService>>,
) -> Result<HttpResponse, LedgerError> {
    let profile = service.resolve_profile(profile_header(&req)).await?;
    let contracts = service.list_contracts(&profile).await?;
    Ok(HttpResponse::Ok().json(contracts))
}

/// A contract owned by the caller
pub async fn get_contract(
    req: HttpRequest,
    service: web::Data<Arc<LedgerService>>,
    contract_id: web::Path<ContractId>,
) -> Result<HttpResponse, LedgerError> {
    let profile = service.resolve_profile(profile_header(&req)).await?;
    let contract = service.get_contract(&profile, *contract_id).await?;
    Ok(HttpResponse::Ok().json(contract))
}

/// Professions ranked by earnings in a time range
pub async fn best_profession(
    req: HttpRequest,
    service: web::Data<Arc<LedgerService>>,
    query: web::Query<ReportQuery>,
) -> Result<HttpResponse, LedgerError> {
    service.resolve_profile(profile_header(&req)).await?;
    let ranked = service.best_professions(&query).await?;
    Ok(HttpResponse::Ok().json(ranked))
}

/// Clients ranked by payouts in a time range
pub async fn best_clients(
    req: HttpRequest,
    service: web::Data<Arc<LedgerService>>,
    query: web::Query<ReportQuery>,
) -> Result<HttpResponse, LedgerError> {
    service.resolve_profile(profile_header(&req)).await?;
    let ranked = service.best_clients(&query).await?;
    Ok(HttpResponse::Ok().json(ranked))
}

/// Prometheus metrics endpoint
pub async fn metrics_endpoint() -> HttpResponse {
    match metrics::metrics_handler() {
        Ok(body) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(body),
        Err(e) => HttpResponse::InternalServerError().json(json!({
            "error": "Failed to gather metrics",
            "details": e.to_string()
        })),
    }
}

/// Configure routes
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::QueryConfig::default().error_handler(|err, _req| {
        LedgerError::Validation(err.to_string()).into()
    }))
    .service(
        web::scope("/balances").route("/deposit/{user_id}", web::post().to(deposit)),
    )
    .service(
        web::scope("/jobs")
            .route("/unpaid", web::get().to(unpaid_jobs))
            .route("/{job_id}/pay", web::post().to(pay_job)),
    )
    .service(
        web::scope("/contracts")
            .route("", web::get().to(list_contracts))
            .route("/{id}", web::get().to(get_contract)),
    )
    .service(
        web::scope("/admin")
            .route("/best-profession", web::get().to(best_profession))
            .route("/best-clients", web::get().to(best_clients)),
    )
    .route("/metrics", web::get().to(metrics_endpoint))
    .route("/health", web::get().to(health_check));
}
