//! # Dashboard Responder Module
//!
//! Thin HTTP layer over the core's read accessors. Handlers only read
//! [`SharedState`] and the log directory; nothing here mutates monitoring
//! state. A dashboard request may observe the previous cycle's values —
//! stale-but-consistent is the contract — and a missing or malformed log
//! file is reported per request, never propagated as a process fault.
//!
//! Routes:
//! - `GET /` — HTML dashboard (current CO2, PM2.5, log file table)
//! - `GET /co2` — latest reading as JSON
//! - `GET /status` — system counters as JSON
//! - `GET /log/{filename}` — a log's readings as JSON pairs
//! - `GET /spark/{filename}` — a log's readings as an SVG line chart
//! - `GET /download/{filename}` — raw CSV
//! - `GET /delete/{filename}` — remove a log file
//! - `GET /truncate/{filename}` — drop a log's last data line

use std::sync::Arc;

use actix_web::{get, web, App, HttpResponse, HttpServer, Responder};
use serde_json::json;
use tracing::info;

use crate::clock::ClockSource;
use crate::error::MonitorError;
use crate::state::SharedState;
use crate::storage::LogStore;

/// Everything the responder is allowed to touch.
pub struct ServerContext {
    pub state: Arc<SharedState>,
    pub store: LogStore,
    pub clock: Arc<dyn ClockSource>,
}

/// Map a storage error onto the per-request taxonomy.
fn storage_error_response(e: MonitorError) -> HttpResponse {
    match e {
        MonitorError::LogNotFound(name) => {
            HttpResponse::NotFound().body(format!("File {} not found", name))
        }
        MonitorError::NoDataLines(_) => {
            HttpResponse::BadRequest().body("no data lines to remove")
        }
        other => HttpResponse::InternalServerError().body(other.to_string()),
    }
}

fn redirect_home() -> HttpResponse {
    HttpResponse::Found()
        .append_header(("Location", "/"))
        .finish()
}

#[get("/")]
async fn index(ctx: web::Data<ServerContext>) -> impl Responder {
    ctx.state.count_request();

    let mut html = String::from("<html><head><title>CO2 Monitor</title></head><body>");
    html.push_str("<h1>CO2 Monitor</h1>");

    match ctx.state.current_reading() {
        Some(reading) => {
            html.push_str(&format!(
                "<p>Current CO2 level: <strong><meter value='{co2}' min='400' max='1500'>{co2}</meter> {co2} ppm</strong></p>",
                co2 = reading.co2_ppm
            ));
            html.push_str("<ul>");
            html.push_str(&format!("<li>Current time: {}</li>", ctx.clock.now()));
            html.push_str(&format!("<li>Last updated: {}</li>", reading.timestamp));
            if !reading.valid {
                html.push_str("<li>Last poll timed out; value may be stale.</li>");
            }
            html.push_str("<li>Values greater than 1000 ppm are considered unhealthy.</li>");
            html.push_str("</ul>");
        }
        None => html.push_str("<p>Waiting for first reading...</p>"),
    }

    match ctx.state.external_reading() {
        Some(pm25) => {
            html.push_str(&format!(
                "<p>Current PM2.5: <strong>{} &micro;g/m&sup3;</strong> (updated {})</p>",
                pm25.value, pm25.measured_at
            ));
        }
        None => html.push_str("<p>PM2.5 data: Waiting for first reading...</p>"),
    }

    html.push_str("<p><a href='/co2'>JSON API</a></p>");
    html.push_str("<h2>Log Files</h2>");
    html.push_str("<table border='1' cellpadding='5'>");
    html.push_str("<tr><th>Filename</th><th>Size</th><th>Actions</th></tr>");

    if let Ok(files) = ctx.store.list_log_files().await {
        for (filename, size) in files {
            html.push_str(&format!(
                "<tr><td>{name}</td><td>{size} bytes</td><td>\
                 <a href='/download/{name}'>Download</a> | \
                 <a href='/delete/{name}' onclick=\"return confirm('Are you sure?')\">Delete</a> | \
                 <a href='/spark/{name}'>Sparkline</a>\
                 </td></tr>",
                name = filename,
                size = size
            ));
        }
    }

    html.push_str("</table></body></html>");
    HttpResponse::Ok().content_type("text/html").body(html)
}

#[get("/co2")]
async fn co2_api(ctx: web::Data<ServerContext>) -> impl Responder {
    ctx.state.count_request();
    match ctx.state.current_reading() {
        Some(reading) => HttpResponse::Ok().json(json!({
            "co2": reading.co2_ppm,
            "valid": reading.valid,
            "timestamp": reading.timestamp.to_string(),
        })),
        None => HttpResponse::Ok().json(json!({
            "co2": null,
            "status": "Data not ready",
        })),
    }
}

#[get("/status")]
async fn status(ctx: web::Data<ServerContext>) -> impl Responder {
    ctx.state.count_request();
    HttpResponse::Ok().json(ctx.state.system_status())
}

#[get("/log/{filename}")]
async fn log_data(ctx: web::Data<ServerContext>, path: web::Path<String>) -> impl Responder {
    ctx.state.count_request();
    match ctx.store.read_log(&path).await {
        Ok(readings) => HttpResponse::Ok().json(readings),
        Err(e) => storage_error_response(e),
    }
}

#[get("/spark/{filename}")]
async fn spark(ctx: web::Data<ServerContext>, path: web::Path<String>) -> impl Responder {
    ctx.state.count_request();
    match ctx.store.read_log(&path).await {
        Ok(readings) => HttpResponse::Ok()
            .content_type("text/html; charset=utf-8")
            .body(render_chart_page(&chart_title(&path), &readings)),
        Err(e) => storage_error_response(e),
    }
}

/// Human-readable title for a log file's chart.
///
/// `readings_20250720.csv` becomes `2025-07-20`, `week33.csv` becomes
/// `week 33`; anything else is shown as-is.
fn chart_title(filename: &str) -> String {
    if let Some(date) = filename
        .strip_prefix("readings_")
        .and_then(|rest| rest.strip_suffix(".csv"))
    {
        if date.len() == 8 && date.chars().all(|c| c.is_ascii_digit()) {
            return format!("{}-{}-{}", &date[0..4], &date[4..6], &date[6..8]);
        }
    }
    if let Some(week) = filename
        .strip_prefix("week")
        .and_then(|rest| rest.strip_suffix(".csv"))
    {
        return format!("week {}", week);
    }
    filename.to_string()
}

/// Render the chart page: readings embedded as JSON, drawn client-side
/// into an SVG with a 24-hour axis and fixed CO2 reference lines.
fn render_chart_page(title: &str, readings: &[(String, u16)]) -> String {
    let data = serde_json::to_string(readings).unwrap_or_else(|_| "[]".to_string());

    let mut html = String::from("<!doctype html>\n<html>\n  <head>\n    <meta charset=\"utf-8\"/>\n");
    html.push_str(&format!("    <title>CO2 {}</title>\n", title));
    html.push_str(
        "    <style>\n\
         body{margin:0;background:#fafafa;font-family:sans-serif}\n\
         svg{display:block;margin:20px auto;background:#fff;border:1px solid #ddd}\n\
         polyline{fill:none;stroke:#4caf50;stroke-width:2}\n\
         text{font-size:12px;fill:#333}\n\
         </style>\n  </head>\n  <body>\n\
         <svg id=\"spark\" width=\"1000\" height=\"600\"></svg>\n\
         <script>\n(function(){\n",
    );
    html.push_str(&format!("const data = {};\n", data));
    html.push_str(&format!("const chartTitle = \"CO2 concentration (ppm) - {}\";\n", title));
    html.push_str(
        "const svg = document.getElementById(\"spark\");\n\
         const W = +svg.getAttribute(\"width\"), H = +svg.getAttribute(\"height\");\n\
         const marginX=60, marginY=40, innerW=W-2*marginX, innerH=H-2*marginY;\n\
         const co2Levels = [500, 1000, 1500, 2000];\n\
         const maxValue = 2000, minValue = 0;\n\
         const hourLabels = [];\n\
         for (let i = 0; i < 24; i++) {\n\
           const x = marginX + (i * innerW / 23);\n\
           const txt = document.createElementNS(svg.namespaceURI,\"text\");\n\
           txt.setAttribute(\"x\", x);\n\
           txt.setAttribute(\"y\", H-15);\n\
           txt.setAttribute(\"text-anchor\", \"middle\");\n\
           txt.textContent = `${i.toString().padStart(2, '0')}:00`;\n\
           hourLabels.push(txt);\n\
         }\n\
         const refLines = [];\n\
         co2Levels.forEach(level => {\n\
           const y = marginY + innerH - ((level - minValue) / (maxValue - minValue)) * innerH;\n\
           const line = document.createElementNS(svg.namespaceURI, \"line\");\n\
           line.setAttribute(\"x1\", marginX);\n\
           line.setAttribute(\"y1\", y);\n\
           line.setAttribute(\"x2\", marginX + innerW);\n\
           line.setAttribute(\"y2\", y);\n\
           line.setAttribute(\"stroke\", \"#ccc\");\n\
           line.setAttribute(\"stroke-width\", 1);\n\
           line.setAttribute(\"stroke-dasharray\", \"3,3\");\n\
           refLines.push(line);\n\
           const label = document.createElementNS(svg.namespaceURI, \"text\");\n\
           label.setAttribute(\"x\", marginX + innerW + 5);\n\
           label.setAttribute(\"y\", y + 4);\n\
           label.setAttribute(\"fill\", \"#666\");\n\
           label.textContent = `${level}ppm`;\n\
           refLines.push(label);\n\
         });\n\
         const pts = data.map(d => {\n\
           const timePart = d[0].split(' ')[1];\n\
           const [hour, minute, second] = timePart.split(':').map(Number);\n\
           const timeIndex = hour + minute/60 + second/3600;\n\
           const x = marginX + (timeIndex * innerW / 24);\n\
           const y = marginY + innerH - ((d[1] - minValue) / (maxValue - minValue)) * innerH;\n\
           return `${x},${y}`;\n\
         }).join(\" \");\n\
         svg.innerHTML = `<g>\n\
           ${refLines.map(line => line.outerHTML).join('')}\n\
           <polyline points=\"${pts}\" stroke=\"#4caf50\" stroke-width=\"2\" fill=\"none\"/>\n\
         </g>`;\n\
         const title = document.createElementNS(svg.namespaceURI,\"text\");\n\
         title.setAttribute(\"x\", W/2);\n\
         title.setAttribute(\"y\", 25);\n\
         title.setAttribute(\"text-anchor\", \"middle\");\n\
         title.textContent = chartTitle;\n\
         svg.appendChild(title);\n\
         hourLabels.forEach(label => svg.appendChild(label));\n\
         })();\n</script>\n  </body>\n</html>\n",
    );
    html
}

#[get("/download/{filename}")]
async fn download(ctx: web::Data<ServerContext>, path: web::Path<String>) -> impl Responder {
    ctx.state.count_request();
    match ctx.store.read_raw(&path).await {
        Ok(contents) => HttpResponse::Ok().content_type("text/csv").body(contents),
        Err(e) => storage_error_response(e),
    }
}

#[get("/delete/{filename}")]
async fn delete(ctx: web::Data<ServerContext>, path: web::Path<String>) -> impl Responder {
    ctx.state.count_request();
    match ctx.store.delete_log(&path).await {
        Ok(()) => redirect_home(),
        Err(e) => storage_error_response(e),
    }
}

#[get("/truncate/{filename}")]
async fn truncate(ctx: web::Data<ServerContext>, path: web::Path<String>) -> impl Responder {
    ctx.state.count_request();
    match ctx.store.truncate_last_line(&path).await {
        Ok(()) => redirect_home(),
        Err(e) => storage_error_response(e),
    }
}

/// Register all responder routes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(index)
        .service(co2_api)
        .service(status)
        .service(log_data)
        .service(spark)
        .service(download)
        .service(delete)
        .service(truncate);
}

/// Run the HTTP responder until the process terminates.
pub async fn run_server(ctx: ServerContext, host: String, port: u16) -> std::io::Result<()> {
    info!("Starting web server on {}:{}...", host, port);
    let data = web::Data::new(ctx);
    HttpServer::new(move || App::new().app_data(data.clone()).configure(configure))
        .bind((host, port))?
        .run()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::mocks::FixedClock;
    use crate::clock::CalendarTime;
    use crate::sensor::Reading;
    use actix_web::{http::StatusCode, test};
    use tempfile::tempdir;

    async fn test_ctx() -> (tempfile::TempDir, web::Data<ServerContext>) {
        let dir = tempdir().unwrap();
        let store = LogStore::open(dir.path().join("readings")).await.unwrap();
        let ctx = ServerContext {
            state: Arc::new(SharedState::new()),
            store,
            clock: Arc::new(FixedClock::new(CalendarTime::new(2025, 7, 20, 10, 5, 0))),
        };
        (dir, web::Data::new(ctx))
    }

    fn reading(co2_ppm: u16) -> Reading {
        Reading {
            timestamp: CalendarTime::new(2025, 7, 20, 10, 0, 0),
            co2_ppm,
            valid: true,
        }
    }

    #[actix_web::test]
    async fn test_index_shows_waiting_state_before_first_cycle() {
        let (_dir, ctx) = test_ctx().await;
        let app =
            test::init_service(App::new().app_data(ctx.clone()).configure(configure)).await;

        let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body = String::from_utf8(test::read_body(resp).await.to_vec()).unwrap();
        assert!(body.contains("Waiting for first reading..."));
        assert!(body.contains("PM2.5 data: Waiting for first reading..."));
    }

    #[actix_web::test]
    async fn test_index_shows_current_reading() {
        let (_dir, ctx) = test_ctx().await;
        ctx.state.publish_reading(reading(612));
        let app =
            test::init_service(App::new().app_data(ctx.clone()).configure(configure)).await;

        let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        let body = String::from_utf8(test::read_body(resp).await.to_vec()).unwrap();
        assert!(body.contains("612 ppm"));
        assert!(body.contains("Last updated: 2025-07-20 10:00:00"));
        assert!(body.contains("Current time: 2025-07-20 10:05:00"));
    }

    #[actix_web::test]
    async fn test_co2_api_not_ready_then_ready() {
        let (_dir, ctx) = test_ctx().await;
        let app =
            test::init_service(App::new().app_data(ctx.clone()).configure(configure)).await;

        let body: serde_json::Value =
            test::call_and_read_body_json(&app, test::TestRequest::get().uri("/co2").to_request())
                .await;
        assert!(body["co2"].is_null());
        assert_eq!(body["status"], "Data not ready");

        ctx.state.publish_reading(reading(612));
        let body: serde_json::Value =
            test::call_and_read_body_json(&app, test::TestRequest::get().uri("/co2").to_request())
                .await;
        assert_eq!(body["co2"], 612);
        assert_eq!(body["timestamp"], "2025-07-20 10:00:00");
    }

    #[actix_web::test]
    async fn test_status_counts_requests() {
        let (_dir, ctx) = test_ctx().await;
        let app =
            test::init_service(App::new().app_data(ctx.clone()).configure(configure)).await;

        let first: serde_json::Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri("/status").to_request(),
        )
        .await;
        let second: serde_json::Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri("/status").to_request(),
        )
        .await;

        assert_eq!(first["requests_total"], 1);
        assert_eq!(second["requests_total"], 2);
    }

    #[actix_web::test]
    async fn test_download_round_trip_and_not_found() {
        let (_dir, ctx) = test_ctx().await;
        ctx.store.ensure_log_file("week33.csv").await.unwrap();
        ctx.store
            .append_reading("week33.csv", "2025-08-11 09:30:00", 540)
            .await
            .unwrap();
        let app =
            test::init_service(App::new().app_data(ctx.clone()).configure(configure)).await;

        let resp = test::call_service(
            &app,
            test::TestRequest::get().uri("/download/week33.csv").to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = String::from_utf8(test::read_body(resp).await.to_vec()).unwrap();
        assert_eq!(body, "time,co2\n2025-08-11 09:30:00,540\n");

        let resp = test::call_service(
            &app,
            test::TestRequest::get().uri("/download/absent.csv").to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_log_data_as_json() {
        let (_dir, ctx) = test_ctx().await;
        ctx.store.ensure_log_file("week33.csv").await.unwrap();
        ctx.store
            .append_reading("week33.csv", "2025-08-11 09:30:00", 540)
            .await
            .unwrap();
        let app =
            test::init_service(App::new().app_data(ctx.clone()).configure(configure)).await;

        let body: serde_json::Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri("/log/week33.csv").to_request(),
        )
        .await;
        assert_eq!(body, json!([["2025-08-11 09:30:00", 540]]));
    }

    #[std::prelude::v1::test]
    fn test_chart_title_from_filename() {
        assert_eq!(chart_title("readings_20250720.csv"), "2025-07-20");
        assert_eq!(chart_title("week33.csv"), "week 33");
        assert_eq!(chart_title("other.csv"), "other.csv");
    }

    #[actix_web::test]
    async fn test_spark_page_embeds_log_data() {
        let (_dir, ctx) = test_ctx().await;
        ctx.store.ensure_log_file("readings_20250720.csv").await.unwrap();
        ctx.store
            .append_reading("readings_20250720.csv", "2025-07-20 10:00:00", 612)
            .await
            .unwrap();
        let app =
            test::init_service(App::new().app_data(ctx.clone()).configure(configure)).await;

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/spark/readings_20250720.csv")
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body = String::from_utf8(test::read_body(resp).await.to_vec()).unwrap();
        assert!(body.contains(r#"const data = [["2025-07-20 10:00:00",612]];"#));
        assert!(body.contains("CO2 concentration (ppm) - 2025-07-20"));
        assert!(body.contains("<svg id=\"spark\""));
    }

    #[actix_web::test]
    async fn test_spark_missing_file_is_404() {
        let (_dir, ctx) = test_ctx().await;
        let app =
            test::init_service(App::new().app_data(ctx.clone()).configure(configure)).await;

        let resp = test::call_service(
            &app,
            test::TestRequest::get().uri("/spark/absent.csv").to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_index_table_links_to_chart() {
        let (_dir, ctx) = test_ctx().await;
        ctx.store.ensure_log_file("week33.csv").await.unwrap();
        let app =
            test::init_service(App::new().app_data(ctx.clone()).configure(configure)).await;

        let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        let body = String::from_utf8(test::read_body(resp).await.to_vec()).unwrap();
        assert!(body.contains("<a href='/spark/week33.csv'>Sparkline</a>"));
    }

    #[actix_web::test]
    async fn test_delete_redirects_and_missing_is_404() {
        let (_dir, ctx) = test_ctx().await;
        ctx.store.ensure_log_file("week33.csv").await.unwrap();
        let app =
            test::init_service(App::new().app_data(ctx.clone()).configure(configure)).await;

        let resp = test::call_service(
            &app,
            test::TestRequest::get().uri("/delete/week33.csv").to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::FOUND);

        let resp = test::call_service(
            &app,
            test::TestRequest::get().uri("/delete/week33.csv").to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_truncate_reports_reason_on_header_only_file() {
        let (_dir, ctx) = test_ctx().await;
        ctx.store.ensure_log_file("week33.csv").await.unwrap();
        ctx.store
            .append_reading("week33.csv", "2025-08-11 09:30:00", 540)
            .await
            .unwrap();
        let app =
            test::init_service(App::new().app_data(ctx.clone()).configure(configure)).await;

        let resp = test::call_service(
            &app,
            test::TestRequest::get().uri("/truncate/week33.csv").to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::FOUND);

        let resp = test::call_service(
            &app,
            test::TestRequest::get().uri("/truncate/week33.csv").to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = String::from_utf8(test::read_body(resp).await.to_vec()).unwrap();
        assert_eq!(body, "no data lines to remove");
    }
}
