use sqlx::PgPool;

/// Provision a per-tenant PostgreSQL schema with all required tables.
/// Called when a barbershop signs up and on every startup.
pub async fn provision_tenant_schema(pool: &PgPool, slug: &str) -> anyhow::Result<()> {
    let schema = schema_name(slug);

    sqlx::raw_sql(&format!("CREATE SCHEMA IF NOT EXISTS \"{schema}\""))
        .execute(pool)
        .await?;

    // --- Enum: user_role ---
    sqlx::raw_sql(&format!(
        "DO $$ BEGIN
           IF NOT EXISTS (
             SELECT 1 FROM pg_type t
             JOIN pg_namespace n ON n.oid = t.typnamespace
             WHERE t.typname = 'user_role' AND n.nspname = '{schema}'
           ) THEN
             CREATE TYPE \"{schema}\".user_role AS ENUM ('owner','barber','client');
           END IF;
         END $$"
    ))
    .execute(pool)
    .await?;

    // --- Enum: booking_status ---
    sqlx::raw_sql(&format!(
        "DO $$ BEGIN
           IF NOT EXISTS (
             SELECT 1 FROM pg_type t
             JOIN pg_namespace n ON n.oid = t.typnamespace
             WHERE t.typname = 'booking_status' AND n.nspname = '{schema}'
           ) THEN
             CREATE TYPE \"{schema}\".booking_status AS ENUM
               ('pending','confirmed','completed','cancelled','no_show');
           END IF;
         END $$"
    ))
    .execute(pool)
    .await?;

    // --- Users ---
    sqlx::raw_sql(&format!(
        r#"CREATE TABLE IF NOT EXISTS "{schema}".users (
            id            UUID PRIMARY KEY DEFAULT public.uuid_generate_v4(),
            email         VARCHAR(255) UNIQUE NOT NULL,
            password_hash TEXT NOT NULL,
            first_name    VARCHAR(128) NOT NULL,
            last_name     VARCHAR(128) NOT NULL,
            phone         VARCHAR(32),
            role          "{schema}".user_role NOT NULL DEFAULT 'client',
            is_active     BOOLEAN NOT NULL DEFAULT TRUE,
            created_at    TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at    TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )"#
    ))
    .execute(pool)
    .await?;

    // --- Refresh tokens ---
    sqlx::raw_sql(&format!(
        r#"CREATE TABLE IF NOT EXISTS "{schema}".refresh_tokens (
            id           UUID PRIMARY KEY,
            user_id      UUID NOT NULL REFERENCES "{schema}".users(id) ON DELETE CASCADE,
            token_hash   TEXT NOT NULL,
            expires_at   TIMESTAMPTZ NOT NULL,
            revoked      BOOLEAN NOT NULL DEFAULT FALSE,
            created_at   TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )"#
    ))
    .execute(pool)
    .await?;

    // --- Barbers (providers) ---
    sqlx::raw_sql(&format!(
        r#"CREATE TABLE IF NOT EXISTS "{schema}".barbers (
            id            UUID PRIMARY KEY DEFAULT public.uuid_generate_v4(),
            user_id       UUID UNIQUE REFERENCES "{schema}".users(id) ON DELETE SET NULL,
            display_name  VARCHAR(128) NOT NULL,
            bio           TEXT,
            is_active     BOOLEAN NOT NULL DEFAULT TRUE,
            created_at    TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at    TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )"#
    ))
    .execute(pool)
    .await?;

    // --- Services ---
    sqlx::raw_sql(&format!(
        r#"CREATE TABLE IF NOT EXISTS "{schema}".services (
            id                UUID PRIMARY KEY DEFAULT public.uuid_generate_v4(),
            name              VARCHAR(128) UNIQUE NOT NULL,
            description       TEXT,
            duration_minutes  INTEGER NOT NULL CHECK (duration_minutes > 0),
            price_cents       INTEGER NOT NULL DEFAULT 0 CHECK (price_cents >= 0),
            is_active         BOOLEAN NOT NULL DEFAULT TRUE,
            created_at        TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at        TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )"#
    ))
    .execute(pool)
    .await?;

    // --- Weekly availability blocks (weekday 0 = Monday) ---
    sqlx::raw_sql(&format!(
        r#"CREATE TABLE IF NOT EXISTS "{schema}".availability (
            id          UUID PRIMARY KEY DEFAULT public.uuid_generate_v4(),
            barber_id   UUID NOT NULL REFERENCES "{schema}".barbers(id) ON DELETE CASCADE,
            weekday     SMALLINT NOT NULL CHECK (weekday BETWEEN 0 AND 6),
            start_time  TIME NOT NULL,
            end_time    TIME NOT NULL,
            created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            CHECK (start_time < end_time)
        )"#
    ))
    .execute(pool)
    .await?;

    sqlx::raw_sql(&format!(
        r#"CREATE INDEX IF NOT EXISTS availability_barber_weekday_idx
           ON "{schema}".availability (barber_id, weekday)"#
    ))
    .execute(pool)
    .await?;

    // --- Bookings ---
    sqlx::raw_sql(&format!(
        r#"CREATE TABLE IF NOT EXISTS "{schema}".bookings (
            id                 UUID PRIMARY KEY DEFAULT public.uuid_generate_v4(),
            barber_id          UUID NOT NULL REFERENCES "{schema}".barbers(id),
            service_id         UUID NOT NULL REFERENCES "{schema}".services(id),
            client_id          UUID REFERENCES "{schema}".users(id) ON DELETE SET NULL,
            client_name        VARCHAR(255) NOT NULL,
            client_phone       VARCHAR(32),
            client_email       VARCHAR(255),
            start_at           TIMESTAMPTZ NOT NULL,
            end_at             TIMESTAMPTZ NOT NULL,
            status             "{schema}".booking_status NOT NULL DEFAULT 'confirmed',
            notes              TEXT,
            confirmation_code  VARCHAR(16) NOT NULL,
            price_cents        INTEGER NOT NULL DEFAULT 0,
            reminder_sent_at   TIMESTAMPTZ,
            created_at         TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at         TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            CHECK (start_at < end_at)
        )"#
    ))
    .execute(pool)
    .await?;

    // No two live bookings may overlap on the same chair.
    sqlx::raw_sql(&format!(
        r#"DO $$ BEGIN
             IF NOT EXISTS (
               SELECT 1 FROM pg_constraint c
               JOIN pg_namespace n ON n.oid = c.connamespace
               WHERE c.conname = 'bookings_no_overlap' AND n.nspname = '{schema}'
             ) THEN
               ALTER TABLE "{schema}".bookings
                 ADD CONSTRAINT bookings_no_overlap
                 EXCLUDE USING gist (
                   barber_id WITH =,
                   tstzrange(start_at, end_at) WITH &&
                 ) WHERE (status <> 'cancelled');
             END IF;
           END $$"#
    ))
    .execute(pool)
    .await?;

    sqlx::raw_sql(&format!(
        r#"CREATE INDEX IF NOT EXISTS bookings_barber_start_idx
             ON "{schema}".bookings (barber_id, start_at);
           CREATE INDEX IF NOT EXISTS bookings_client_idx
             ON "{schema}".bookings (client_id);
           CREATE INDEX IF NOT EXISTS bookings_reminder_idx
             ON "{schema}".bookings (start_at) WHERE reminder_sent_at IS NULL"#
    ))
    .execute(pool)
    .await?;

    // --- Audit log ---
    sqlx::raw_sql(&format!(
        r#"CREATE TABLE IF NOT EXISTS "{schema}".audit_log (
            id             UUID PRIMARY KEY DEFAULT public.uuid_generate_v4(),
            user_id        UUID,
            action         VARCHAR(64) NOT NULL,
            resource_type  VARCHAR(64),
            resource_id    VARCHAR(64),
            created_at     TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )"#
    ))
    .execute(pool)
    .await?;

    // --- updated_at trigger function ---
    sqlx::raw_sql(&format!(
        r#"CREATE OR REPLACE FUNCTION "{schema}".update_updated_at()
           RETURNS TRIGGER AS $fn$
           BEGIN NEW.updated_at = NOW(); RETURN NEW; END;
           $fn$ LANGUAGE plpgsql"#
    ))
    .execute(pool)
    .await?;

    for table in &["users", "barbers", "services", "bookings"] {
        let trigger = format!("{table}_updated_at");
        sqlx::raw_sql(&format!(
            r#"DROP TRIGGER IF EXISTS "{trigger}" ON "{schema}"."{table}";
               CREATE TRIGGER "{trigger}"
               BEFORE UPDATE ON "{schema}"."{table}"
               FOR EACH ROW EXECUTE FUNCTION "{schema}".update_updated_at()"#
        ))
        .execute(pool)
        .await?;
    }

    tracing::info!("Provisioned tenant schema: {schema}");
    Ok(())
}

/// Drops a tenant schema and everything in it.
pub async fn drop_tenant_schema(pool: &PgPool, slug: &str) -> anyhow::Result<()> {
    let schema = schema_name(slug);
    sqlx::raw_sql(&format!("DROP SCHEMA IF EXISTS \"{schema}\" CASCADE"))
        .execute(pool)
        .await?;
    tracing::info!("Dropped tenant schema: {schema}");
    Ok(())
}

/// Returns the PostgreSQL schema name for a given barbershop slug.
pub fn schema_name(slug: &str) -> String {
    format!("shop_{}", slug.to_lowercase().replace('-', "_"))
}

#[cfg(test)]
mod tests {
    use super::schema_name;

    #[test]
    fn schema_name_is_lowercase_and_underscored() {
        assert_eq!(schema_name("Fade-Club"), "shop_fade_club");
        assert_eq!(schema_name("barber42"), "shop_barber42");
    }
}
