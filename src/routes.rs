use crate::{
    api::{attendance, dashboard, department, ml, notification, report, settings, user},
    auth::handlers,
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::web;
use std::sync::Arc;

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    // Helper to build per-route limiter
    fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
        let per_ms = if requests_per_min == 0 {
            1
        } else {
            60_000 / requests_per_min as u64
        };
        let cfg = GovernorConfigBuilder::default()
            .per_millisecond(per_ms)
            .burst_size(requests_per_min)
            .key_extractor(PeerIpKeyExtractor)
            .finish()
            .unwrap();
        Governor::new(&cfg)
    }

    let login_limiter = Arc::new(build_limiter(config.rate_login_per_min));
    let protected_limiter = Arc::new(build_limiter(config.rate_protected_per_min));

    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/logout")
                    .wrap(login_limiter)
                    .route(web::post().to(handlers::logout)),
            ),
    );
    // The check-in kiosk needs the working-hours settings before login.
    cfg.service(
        web::resource("/settings/public").route(web::get().to(settings::public_settings)),
    );

    // Protected routes; authentication happens in the AuthUser extractor.
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(protected_limiter)
            .service(
                web::scope("/attendance")
                    // /attendance
                    .service(web::resource("").route(web::post().to(attendance::record_attendance)))
                    // /attendance/my
                    .service(web::resource("/my").route(web::get().to(attendance::my_records)))
                    // /attendance/today
                    .service(web::resource("/today").route(web::get().to(attendance::today_records)))
                    // /attendance/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::put().to(attendance::update_attendance))
                            .route(web::delete().to(attendance::delete_attendance)),
                    ),
            )
            .service(
                web::scope("/reports")
                    .service(
                        web::resource("/comprehensive")
                            .route(web::get().to(report::comprehensive_report)),
                    )
                    .service(
                        web::resource("/monthly-stats").route(web::get().to(report::monthly_stats)),
                    )
                    .service(
                        web::resource("/department-late-trend")
                            .route(web::get().to(report::department_late_trend)),
                    )
                    .service(
                        web::resource("/department-performance")
                            .route(web::get().to(report::department_performance)),
                    )
                    .service(web::resource("/scorecard").route(web::get().to(report::scorecard))),
            )
            .service(web::resource("/dashboard").route(web::get().to(dashboard::dashboard)))
            .service(
                web::scope("/users")
                    // /users
                    .service(
                        web::resource("")
                            .route(web::post().to(user::create_user))
                            .route(web::get().to(user::list_users)),
                    )
                    // /users/me
                    .service(web::resource("/me").route(web::get().to(user::my_profile)))
                    // /users/change-password
                    .service(
                        web::resource("/change-password")
                            .route(web::post().to(user::change_password)),
                    )
                    // /users/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(user::get_user))
                            .route(web::put().to(user::update_user))
                            .route(web::delete().to(user::delete_user)),
                    ),
            )
            .service(
                web::scope("/departments")
                    .service(
                        web::resource("")
                            .route(web::post().to(department::create_department))
                            .route(web::get().to(department::list_departments)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(department::get_department))
                            .route(web::put().to(department::update_department))
                            .route(web::delete().to(department::delete_department)),
                    ),
            )
            .service(
                web::scope("/notifications")
                    .service(
                        web::resource("").route(web::get().to(notification::my_notifications)),
                    )
                    .service(
                        web::resource("/mark-read")
                            .route(web::post().to(notification::mark_as_read)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::delete().to(notification::delete_notification)),
                    ),
            )
            .service(
                web::scope("/ml")
                    .service(web::resource("/anomalies").route(web::get().to(ml::anomalies)))
                    .service(web::resource("/clusters").route(web::get().to(ml::clusters)))
                    .service(web::resource("/train").route(web::post().to(ml::train))),
            )
            .service(
                web::resource("/settings")
                    .route(web::get().to(settings::get_settings))
                    .route(web::put().to(settings::update_settings)),
            ),
    );
}

// LOGIN
//  ├─ access_token (15 min)
//  └─ refresh_token (7 days)
//
// API REQUEST
//  └─ Authorization: Bearer access_token (or the access_token cookie)
//
// ACCESS EXPIRED
//  └─ POST /auth/refresh with refresh_token
//       └─ returns new access_token
