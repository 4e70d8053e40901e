use chrono::{
    DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc,
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    db::tenant::schema_name,
    error::{ApiError, ApiResult},
    models::{
        availability::{AvailabilityBlock, BlockInput, Slot, SlotsResponse},
        tenant::shop_offset,
    },
    services::{barbers::BarberService, catalog::CatalogService},
};

/// Half-open interval overlap: `[a_start, a_end)` and `[b_start, b_end)`.
pub fn overlaps<T: PartialOrd>(a_start: T, a_end: T, b_start: T, b_end: T) -> bool {
    a_start < b_end && b_start < a_end
}

/// Weekday index used in the availability table (Monday = 0).
pub fn weekday_index(date: NaiveDate) -> i16 {
    date.weekday().num_days_from_monday() as i16
}

/// Checks a weekly schedule: weekday range, start before end, and no two
/// blocks overlapping on the same weekday.
pub fn validate_blocks(blocks: &[BlockInput]) -> Result<(), String> {
    for b in blocks {
        if !(0..=6).contains(&b.weekday) {
            return Err(format!("weekday must be between 0 and 6, got {}", b.weekday));
        }
        if b.start_time >= b.end_time {
            return Err(format!(
                "block {}-{} on weekday {} must start before it ends",
                b.start_time, b.end_time, b.weekday
            ));
        }
    }

    let mut sorted: Vec<&BlockInput> = blocks.iter().collect();
    sorted.sort_by_key(|b| (b.weekday, b.start_time));
    for pair in sorted.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if a.weekday == b.weekday && overlaps(a.start_time, a.end_time, b.start_time, b.end_time) {
            return Err(format!(
                "blocks {}-{} and {}-{} overlap on weekday {}",
                a.start_time, a.end_time, b.start_time, b.end_time, a.weekday
            ));
        }
    }
    Ok(())
}

fn local_to_utc(date: NaiveDate, time: NaiveTime, offset: FixedOffset) -> Option<DateTime<Utc>> {
    offset
        .from_local_datetime(&date.and_time(time))
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

/// UTC instants bounding the shop-local calendar day `date`.
pub fn day_bounds(date: NaiveDate, offset: FixedOffset) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let start = local_to_utc(date, NaiveTime::default(), offset)?;
    Some((start, start + Duration::days(1)))
}

/// Generates candidate slots for one day.
///
/// For each working block, candidates start at the block start and advance
/// by `step` while the whole service still fits inside the block. A
/// candidate is available when it starts after `now` and does not overlap
/// any of the `busy` intervals.
pub fn generate_slots(
    date: NaiveDate,
    offset: FixedOffset,
    blocks: &[(NaiveTime, NaiveTime)],
    duration: Duration,
    step: Duration,
    busy: &[(DateTime<Utc>, DateTime<Utc>)],
    now: DateTime<Utc>,
) -> Vec<Slot> {
    let mut slots = Vec::new();
    if duration <= Duration::zero() || step <= Duration::zero() {
        return slots;
    }

    let mut sorted = blocks.to_vec();
    sorted.sort();

    for (block_start, block_end) in sorted {
        let (Some(start), Some(end)) = (
            local_to_utc(date, block_start, offset),
            local_to_utc(date, block_end, offset),
        ) else {
            continue;
        };

        let mut candidate = start;
        while candidate + duration <= end {
            let slot_end = candidate + duration;
            let free = !busy
                .iter()
                .any(|&(b_start, b_end)| overlaps(candidate, slot_end, b_start, b_end));
            slots.push(Slot {
                start_at: candidate.with_timezone(&offset),
                end_at: slot_end.with_timezone(&offset),
                available: free && candidate > now,
            });
            candidate += step;
        }
    }
    slots
}

/// True when `[start, end)` lies entirely within one of the blocks on the
/// shop-local day it starts on.
pub fn fits_in_blocks(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    offset: FixedOffset,
    blocks: &[AvailabilityBlock],
) -> bool {
    let local_start = start.with_timezone(&offset);
    let local_end = end.with_timezone(&offset);
    if local_start.date_naive() != local_end.date_naive() {
        return false;
    }
    let weekday = weekday_index(local_start.date_naive());
    blocks.iter().any(|b| {
        b.weekday == weekday
            && b.start_time <= local_start.time()
            && local_end.time() <= b.end_time
    })
}

pub struct AvailabilityService;

impl AvailabilityService {
    pub async fn list(pool: &PgPool, tenant: &str, barber_id: Uuid) -> ApiResult<Vec<AvailabilityBlock>> {
        let schema = schema_name(tenant);
        let blocks = sqlx::query_as::<_, AvailabilityBlock>(&format!(
            r#"SELECT * FROM "{schema}".availability
               WHERE barber_id = $1
               ORDER BY weekday, start_time"#
        ))
        .bind(barber_id)
        .fetch_all(pool)
        .await?;
        Ok(blocks)
    }

    /// Replace the whole weekly schedule of a barber in one transaction.
    pub async fn replace(
        pool: &PgPool,
        tenant: &str,
        barber_id: Uuid,
        blocks: &[BlockInput],
    ) -> ApiResult<Vec<AvailabilityBlock>> {
        validate_blocks(blocks).map_err(ApiError::Validation)?;
        BarberService::get(pool, tenant, barber_id).await?;

        let schema = schema_name(tenant);
        let mut tx = pool.begin().await?;

        sqlx::query(&format!(r#"DELETE FROM "{schema}".availability WHERE barber_id = $1"#))
            .bind(barber_id)
            .execute(&mut *tx)
            .await?;

        for block in blocks {
            sqlx::query(&format!(
                r#"INSERT INTO "{schema}".availability (barber_id, weekday, start_time, end_time)
                   VALUES ($1, $2, $3, $4)"#
            ))
            .bind(barber_id)
            .bind(block.weekday)
            .bind(block.start_time)
            .bind(block.end_time)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Self::list(pool, tenant, barber_id).await
    }

    /// Non-cancelled bookings of a barber intersecting `[from, to)`.
    pub async fn busy_intervals(
        pool: &PgPool,
        tenant: &str,
        barber_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> ApiResult<Vec<(DateTime<Utc>, DateTime<Utc>)>> {
        let schema = schema_name(tenant);
        let rows: Vec<(DateTime<Utc>, DateTime<Utc>)> = sqlx::query_as(&format!(
            r#"SELECT start_at, end_at FROM "{schema}".bookings
               WHERE barber_id = $1
                 AND status <> 'cancelled'
                 AND start_at < $3 AND end_at > $2
               ORDER BY start_at"#
        ))
        .bind(barber_id)
        .bind(from)
        .bind(to)
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }

    pub async fn slots(
        pool: &PgPool,
        tenant: &str,
        barber_id: Uuid,
        service_id: Uuid,
        date: NaiveDate,
        step_minutes: u32,
    ) -> ApiResult<SlotsResponse> {
        let barber = BarberService::get(pool, tenant, barber_id).await?;
        if !barber.is_active {
            return Err(ApiError::NotFound("Barber"));
        }
        let service = CatalogService::get(pool, tenant, service_id).await?;
        if !service.is_active {
            return Err(ApiError::NotFound("Service"));
        }

        let offset = shop_offset(tenant_offset_minutes(pool, tenant).await?);
        let weekday = weekday_index(date);
        let blocks: Vec<(NaiveTime, NaiveTime)> = Self::list(pool, tenant, barber_id)
            .await?
            .into_iter()
            .filter(|b| b.weekday == weekday)
            .map(|b| (b.start_time, b.end_time))
            .collect();

        let (day_start, day_end) =
            day_bounds(date, offset).ok_or_else(|| ApiError::validation("Invalid date"))?;
        let busy = Self::busy_intervals(pool, tenant, barber_id, day_start, day_end).await?;

        let slots = generate_slots(
            date,
            offset,
            &blocks,
            Duration::minutes(service.duration_minutes as i64),
            Duration::minutes(step_minutes as i64),
            &busy,
            Utc::now(),
        );

        Ok(SlotsResponse {
            barber_id,
            service_id,
            date,
            duration_minutes: service.duration_minutes,
            slots,
        })
    }
}

pub async fn tenant_offset_minutes(pool: &PgPool, tenant: &str) -> ApiResult<i32> {
    let offset: Option<i32> = sqlx::query_scalar(
        "SELECT timezone_offset_minutes FROM public.barbershops WHERE slug = $1",
    )
    .bind(tenant)
    .fetch_optional(pool)
    .await?;
    offset.ok_or(ApiError::NotFound("Barbershop"))
}
