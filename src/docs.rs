use crate::api::attendance::{MyRecord, RecordAttendanceReq, TodayRecord, TodaySubject};
use crate::api::dashboard::{
    AbsentStaff, DailyPoint, DashboardKpis, DepartmentLate, LateArrival, PerformerEntry,
};
use crate::api::department::DepartmentReq;
use crate::api::notification::MarkReadReq;
use crate::api::report::{
    DepartmentPerformance, LateTrendPoint, ReportRecord, ReportSubject, ScorecardEntry,
};
use crate::api::user::{ChangePasswordReq, CreateUserReq, UpdateUserReq};
use crate::auth::handlers::{LoginReq, RefreshReq};
use crate::model::attendance::{
    AttendanceRecord, AttendanceStatus, EditHistoryEntry, EditSnapshot, UpdateAttendance,
};
use crate::model::department::Department;
use crate::model::notification::{Notification, NotificationType};
use crate::model::role::Role;
use crate::model::user::{User, UserRef};
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Attendance Tracking System API",
        version = "1.0.0",
        description = r#"
## Institutional Attendance Tracking System

This API powers an **attendance tracking** backend for an academic institution.

### 🔹 Key Features
- **Attendance Recording**
  - Officer-driven check-in / check-out with automatic lateness detection
  - Role-gated corrections with a full edit-history audit trail
- **Reporting**
  - Comprehensive filterable report with spreadsheet export
  - Monthly work-hour stats, department late trends, performance scorecards
- **Administration**
  - User, department, and working-hours settings management
- **Insights**
  - Admin dashboard with KPIs, trends, and ML anomaly/cluster sections

### 🔐 Security
Most endpoints are protected using **JWT Bearer authentication** (header or
cookie). Sensitive operations require the **admin** or **officer** role.

### 📦 Response Format
- JSON `{success, message?, data?}` envelopes
- Pagination supported for list endpoints
- Calendar dates use the regional `YYYY/MM/DD` form

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::auth::handlers::login,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::logout,

        crate::api::attendance::record_attendance,
        crate::api::attendance::update_attendance,
        crate::api::attendance::my_records,
        crate::api::attendance::today_records,
        crate::api::attendance::delete_attendance,

        crate::api::report::comprehensive_report,
        crate::api::report::monthly_stats,
        crate::api::report::department_late_trend,
        crate::api::report::department_performance,
        crate::api::report::scorecard,

        crate::api::dashboard::dashboard,

        crate::api::user::create_user,
        crate::api::user::list_users,
        crate::api::user::my_profile,
        crate::api::user::get_user,
        crate::api::user::update_user,
        crate::api::user::delete_user,
        crate::api::user::change_password,

        crate::api::department::create_department,
        crate::api::department::list_departments,
        crate::api::department::get_department,
        crate::api::department::update_department,
        crate::api::department::delete_department,

        crate::api::notification::my_notifications,
        crate::api::notification::mark_as_read,
        crate::api::notification::delete_notification,

        crate::api::ml::anomalies,
        crate::api::ml::clusters,
        crate::api::ml::train,

        crate::api::settings::get_settings,
        crate::api::settings::update_settings,
        crate::api::settings::public_settings
    ),
    components(
        schemas(
            LoginReq,
            RefreshReq,
            Role,
            User,
            UserRef,
            CreateUserReq,
            UpdateUserReq,
            ChangePasswordReq,
            Department,
            DepartmentReq,
            AttendanceStatus,
            AttendanceRecord,
            EditSnapshot,
            EditHistoryEntry,
            UpdateAttendance,
            RecordAttendanceReq,
            MyRecord,
            TodayRecord,
            TodaySubject,
            ReportRecord,
            ReportSubject,
            LateTrendPoint,
            DepartmentPerformance,
            ScorecardEntry,
            DashboardKpis,
            DailyPoint,
            DepartmentLate,
            PerformerEntry,
            LateArrival,
            AbsentStaff,
            Notification,
            NotificationType,
            MarkReadReq
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Login and token lifecycle"),
        (name = "Attendance", description = "Check-in/out recording and corrections"),
        (name = "Reports", description = "Aggregated reporting APIs"),
        (name = "Dashboard", description = "Admin dashboard"),
        (name = "Users", description = "User management APIs"),
        (name = "Departments", description = "Department management APIs"),
        (name = "Notifications", description = "In-app notifications"),
        (name = "ML", description = "Anomaly detection and clustering"),
        (name = "Settings", description = "Working-hours and policy settings"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
