//! Dashboard statistics for one user and for the whole system.

use axum::{extract::State, Json};
use chrono::{Datelike, Duration, Utc};
use serde_json::{json, Value};

use crate::auth::{AdminUser, AuthUser};
use crate::error::Result;
use crate::history::{day_start, month_start, percent, round_to};
use crate::state::AppState;
use crate::store::{stats, timestamp, users};

const DISTRIBUTION_TYPES: i64 = 6;
const TREND_DAYS: i64 = 7;

pub async fn user_stats(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Value>> {
    let now = Utc::now();
    let month = timestamp(month_start(now));
    let week = timestamp(now - Duration::days(7));
    let id = user.id;

    let (all, monthly, weekly) = state
        .store
        .call(move |conn| {
            Ok((
                stats::aggregate(conn, Some(id), None)?,
                stats::aggregate(conn, Some(id), Some(month.as_str()))?,
                stats::aggregate(conn, Some(id), Some(week.as_str()))?,
            ))
        })
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": {
            "totalDetections": all.count,
            "monthlyDetections": monthly.count,
            "totalDefects": all.total_defects,
            "monthlyDefects": monthly.total_defects,
            "averageConfidence": round_to(all.average_confidence * 100.0, 2),
            "averageDetectionTime": monthly.average_detection_time.round() as i64,
            "qualityRate": round_to(all.quality_rate(), 1),
            "recentDetections": weekly.count,
            "defectiveDetections": all.defective,
            "currentMonth": now.month(),
            "currentYear": now.year(),
        },
    })))
}

/// Month-over-month growth estimate: this month against four weeks at the
/// current weekly pace. Zero unless the month is ahead of that pace.
fn monthly_growth(weekly: i64, monthly: i64) -> f64 {
    let baseline = weekly * 4;
    if weekly > 0 && monthly > baseline {
        round_to((monthly - baseline) as f64 / baseline as f64 * 100.0, 1)
    } else {
        0.0
    }
}

pub async fn system_stats(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> Result<Json<Value>> {
    let now = Utc::now();
    let month = timestamp(month_start(now));
    let week = timestamp(now - Duration::days(7));
    let day = timestamp(now - Duration::hours(24));
    let today = day_start(now);
    let trend_days: Vec<_> = (0..TREND_DAYS)
        .rev()
        .map(|back| today - Duration::days(back))
        .collect();

    let (all, total_defects, total_users, weekly, monthly, recent, distribution, trend) = state
        .store
        .call(move |conn| {
            let trend = trend_days
                .iter()
                .map(|start| -> Result<(String, i64)> {
                    let end = *start + Duration::days(1);
                    let count = stats::count_between(conn, &timestamp(*start), &timestamp(end))?;
                    Ok((start.format("%Y-%m-%d").to_string(), count))
                })
                .collect::<Result<Vec<_>>>()?;
            Ok((
                stats::aggregate(conn, None, None)?,
                stats::count_defects(conn)?,
                users::count_active(conn)?,
                stats::aggregate(conn, None, Some(week.as_str()))?.count,
                stats::aggregate(conn, None, Some(month.as_str()))?.count,
                stats::aggregate(conn, None, Some(day.as_str()))?.count,
                stats::defect_type_counts(conn, None, Some(DISTRIBUTION_TYPES))?,
                trend,
            ))
        })
        .await?;

    let distribution: Vec<Value> = distribution
        .into_iter()
        .map(|(kind, count)| {
            let percentage = if total_defects > 0 {
                round_to(count as f64 / total_defects as f64 * 100.0, 1)
            } else {
                0.0
            };
            json!({ "type": kind, "count": count, "percentage": percentage })
        })
        .collect();
    let weekly_trend: Vec<Value> = trend
        .into_iter()
        .map(|(date, inspections)| json!({ "date": date, "inspections": inspections }))
        .collect();

    Ok(Json(json!({
        "success": true,
        "data": {
            "totalInspections": all.count,
            "totalDefects": total_defects,
            "totalUsers": total_users,
            "weeklyInspections": weekly,
            "monthlyInspections": monthly,
            "recentActivity": recent,
            "defectiveInspections": all.defective,
            "averageConfidence": percent(all.average_confidence),
            "qualityRate": round_to(all.quality_rate(), 1),
            "defectRate": round_to(all.defect_rate(), 1),
            "defectTypeDistribution": distribution,
            "weeklyTrend": weekly_trend,
            "growth": {
                "dailyAverage": round_to(weekly as f64 / 7.0, 1),
                "monthlyGrowth": monthly_growth(weekly, monthly),
            },
            "systemHealth": {
                "status": "healthy",
                "uptime": state.uptime_secs(),
                "lastUpdate": timestamp(now),
            },
        },
    })))
}
