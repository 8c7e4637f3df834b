use actix_files::{Files, NamedFile};
use actix_identity::Identity;
use actix_session::Session;
use actix_web::{
    get,
    http::{
        header::{self, ContentDisposition, DispositionParam, DispositionType},
        Method, StatusCode,
    },
    post,
    web::{self, Data},
    Either, HttpMessage, HttpRequest, HttpResponse, Responder,
};
use chrono::Local;
use serde_json::json;
use tera::Context;

use crate::{
    aggregate::Dashboard,
    auth, db,
    errors::AppError,
    flash,
    report::{self, PageGeometry, REPORT_FILE_NAME},
    session::CurrentUser,
    structs::{ClearMonth, Credentials, ExpenseForm, MonthQuery, SetBudget},
    utils::validate_amount,
    AppState, TEMPLATES,
};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(Files::new("/static", "static"))
        .service(login_page)
        .service(login_form_handler)
        .service(signup_page)
        .service(signup_form_handler)
        .service(logout_handler)
        .service(dashboard_handler)
        .service(add_page)
        .service(add_form_handler)
        .service(edit_page)
        .service(edit_form_handler)
        .service(delete_handler)
        .service(set_budget_handler)
        .service(clear_month_handler)
        .service(clear_all_handler)
        .service(export_pdf_handler)
        .default_service(web::to(default_handler));
}

fn page_context(session: &Session, title: &str) -> Context {
    let mut context = Context::new();
    context.insert("title", title);
    context.insert("flashes", &flash::take(session));
    context.insert("version", env!("CARGO_PKG_VERSION"));
    context
}

fn render(template: &str, context: &Context) -> Result<HttpResponse, AppError> {
    let rendered = TEMPLATES.render(template, context).map_err(|e| {
        log::error!("Failed to render template {}: {}", template, e);
        AppError::Template(e)
    })?;

    Ok(HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(rendered))
}

fn redirect(location: &str) -> HttpResponse {
    HttpResponse::SeeOther()
        .append_header((header::LOCATION, location))
        .finish()
}

fn current_month() -> String {
    Local::now().format("%Y-%m").to_string()
}

// ----- login / signup / logout -----

#[get("/")]
pub async fn login_page(session: Session) -> Result<impl Responder, AppError> {
    render("login.html", &page_context(&session, "Login"))
}

#[post("/")]
pub async fn login_form_handler(
    web::Form(form): web::Form<Credentials>,
    state: Data<AppState>,
    session: Session,
    request: HttpRequest,
) -> Result<impl Responder, AppError> {
    let mut conn = db::connect(&state).await?;
    let now = Local::now().naive_local();

    match auth::authenticate(&mut conn, &state.lockout, &form.username, &form.password, now).await {
        Ok(account) => {
            Identity::login(&request.extensions(), account.username.clone())
                .map_err(|e| AppError::Session(e.to_string()))?;
            flash::success(&session, format!("Welcome {}", account.username));
            Ok(redirect("/dashboard"))
        }
        Err(e @ (AppError::InvalidCredential | AppError::AccountLocked)) => {
            flash::danger(&session, e.to_string());
            Ok(redirect("/"))
        }
        Err(e) => Err(e),
    }
}

#[get("/signup")]
pub async fn signup_page(session: Session) -> Result<impl Responder, AppError> {
    render("signup.html", &page_context(&session, "Sign up"))
}

#[post("/signup")]
pub async fn signup_form_handler(
    web::Form(form): web::Form<Credentials>,
    state: Data<AppState>,
    session: Session,
) -> Result<impl Responder, AppError> {
    let username = form.username.trim();
    if username.is_empty() || form.password.is_empty() {
        flash::danger(&session, "Username and password are required");
        return Ok(redirect("/signup"));
    }

    let mut conn = db::connect(&state).await?;
    match auth::register(&mut conn, username, &form.password).await {
        Ok(()) => {
            flash::success(&session, "Account created");
            Ok(redirect("/"))
        }
        Err(e @ AppError::IdentityTaken) => {
            flash::danger(&session, e.to_string());
            Ok(redirect("/signup"))
        }
        Err(e) => Err(e),
    }
}

#[get("/logout")]
pub async fn logout_handler(identity: Option<Identity>, session: Session) -> impl Responder {
    if let Some(identity) = identity {
        identity.logout();
    }
    session.purge();
    redirect("/")
}

// ----- dashboard -----

#[get("/dashboard")]
pub async fn dashboard_handler(
    user: CurrentUser,
    query: web::Query<MonthQuery>,
    state: Data<AppState>,
    session: Session,
) -> Result<impl Responder, AppError> {
    let selected = query.selected();
    let effective = selected.map(str::to_string).unwrap_or_else(current_month);

    let mut conn = db::connect(&state).await?;
    let visible = db::list_expenses(&mut conn, user.name(), selected).await?;
    let history = db::list_expenses(&mut conn, user.name(), None).await?;
    let budget = db::get_budget(&mut conn, user.name(), &effective).await?;

    let dashboard = Dashboard::build(visible, &history, budget, selected, &effective);

    let mut context = Context::from_serialize(&dashboard)?;
    context.extend(page_context(&session, "Dashboard"));
    context.insert("username", user.name());
    context.insert("has_budget", &dashboard.budget.is_some());
    render("dashboard.html", &context)
}

// ----- expenses -----

#[get("/add")]
pub async fn add_page(user: CurrentUser, session: Session) -> Result<impl Responder, AppError> {
    let mut context = page_context(&session, "Add expense");
    context.insert("username", user.name());
    context.insert("today", &Local::now().format("%Y-%m-%d").to_string());
    render("add_expense.html", &context)
}

#[post("/add")]
pub async fn add_form_handler(
    user: CurrentUser,
    web::Form(form): web::Form<ExpenseForm>,
    state: Data<AppState>,
    session: Session,
) -> Result<impl Responder, AppError> {
    let amount = match validate_amount(&form.amount) {
        Ok(amount) => amount,
        Err(e) => {
            flash::danger(&session, e.to_string());
            return Ok(redirect("/add"));
        }
    };
    let mut conn = db::connect(&state).await?;
    db::insert_expense(&mut conn, user.name(), amount, form.effective_category(), &form.date).await?;

    flash::success(&session, "Expense added");
    Ok(redirect("/dashboard"))
}

#[get("/edit/{id}")]
pub async fn edit_page(
    user: CurrentUser,
    path: web::Path<i64>,
    state: Data<AppState>,
    session: Session,
) -> Result<impl Responder, AppError> {
    let id = path.into_inner();
    let mut conn = db::connect(&state).await?;
    let Some(expense) = db::get_expense(&mut conn, id, user.name()).await? else {
        log::debug!("Expense {} not found for {}", id, user.name());
        return Ok(redirect("/dashboard"));
    };

    let mut context = page_context(&session, "Edit expense");
    context.insert("username", user.name());
    context.insert("expense", &expense);
    render("edit_expense.html", &context)
}

#[post("/edit/{id}")]
pub async fn edit_form_handler(
    user: CurrentUser,
    path: web::Path<i64>,
    web::Form(form): web::Form<ExpenseForm>,
    state: Data<AppState>,
    session: Session,
) -> Result<impl Responder, AppError> {
    let id = path.into_inner();
    let amount = match validate_amount(&form.amount) {
        Ok(amount) => amount,
        Err(e) => {
            flash::danger(&session, e.to_string());
            return Ok(redirect(&format!("/edit/{}", id)));
        }
    };
    let mut conn = db::connect(&state).await?;
    let updated = db::update_expense(
        &mut conn,
        id,
        user.name(),
        amount,
        form.effective_category(),
        &form.date,
    )
    .await?;
    if updated == 0 {
        log::debug!("Edit of expense {} by {} matched nothing", id, user.name());
    }

    flash::success(&session, "Expense updated");
    Ok(redirect("/dashboard"))
}

#[get("/delete/{id}")]
pub async fn delete_handler(
    user: CurrentUser,
    path: web::Path<i64>,
    state: Data<AppState>,
) -> Result<impl Responder, AppError> {
    let id = path.into_inner();
    let mut conn = db::connect(&state).await?;
    if db::delete_expense(&mut conn, id, user.name()).await? == 0 {
        log::debug!("Delete of expense {} by {} matched nothing", id, user.name());
    }
    Ok(redirect("/dashboard"))
}

// ----- structured endpoints -----

#[post("/set_budget")]
pub async fn set_budget_handler(
    user: CurrentUser,
    web::Json(body): web::Json<SetBudget>,
    state: Data<AppState>,
) -> Result<impl Responder, AppError> {
    let mut conn = db::connect(&state).await?;
    db::set_budget(&mut conn, user.name(), &body.month, body.amount.value()).await?;
    Ok(HttpResponse::Ok().json(json!({ "status": "ok" })))
}

#[post("/clear_month")]
pub async fn clear_month_handler(
    user: CurrentUser,
    web::Json(body): web::Json<ClearMonth>,
    state: Data<AppState>,
) -> Result<impl Responder, AppError> {
    let mut conn = db::connect(&state).await?;
    let removed = db::delete_expenses_in_month(&mut conn, user.name(), &body.month).await?;
    log::info!("Cleared {} expenses of {} for {}", removed, user.name(), body.month);
    Ok(HttpResponse::Ok().json(json!({ "status": "ok" })))
}

#[post("/clear_all")]
pub async fn clear_all_handler(
    user: CurrentUser,
    state: Data<AppState>,
) -> Result<impl Responder, AppError> {
    let mut conn = db::connect(&state).await?;
    let removed = db::delete_all_expenses(&mut conn, user.name()).await?;
    log::info!("Cleared all {} expenses of {}", removed, user.name());
    Ok(HttpResponse::Ok().json(json!({ "done": 1 })))
}

// ----- export -----

#[get("/export_pdf")]
pub async fn export_pdf_handler(
    user: CurrentUser,
    query: web::Query<MonthQuery>,
    state: Data<AppState>,
) -> Result<impl Responder, AppError> {
    let selected = query.selected();
    let mut conn = db::connect(&state).await?;
    let expenses = db::list_expenses(&mut conn, user.name(), selected).await?;
    drop(conn);

    let geometry = PageGeometry::A4;
    let pages = report::layout(
        &report::title_for(selected),
        &expenses,
        &state.currency_symbol,
        &geometry,
    );
    let pdf = report::render_pdf(&pages, &geometry);

    Ok(HttpResponse::Ok()
        .content_type("application/pdf")
        .insert_header(ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename(REPORT_FILE_NAME.to_string())],
        })
        .body(pdf))
}

async fn default_handler(req_method: Method) -> Result<impl Responder, std::io::Error> {
    match req_method {
        Method::GET => {
            let file = NamedFile::open("static/404.html")?
                .customize()
                .with_status(StatusCode::NOT_FOUND);
            Ok(Either::Left(file))
        }
        _ => Ok(Either::Right(HttpResponse::MethodNotAllowed().finish())),
    }
}
