//! SQLite store implementation.
//!
//! Check-and-write operations run inside `BEGIN IMMEDIATE` transactions so
//! the write lock is taken before the first read. Every transaction is a
//! [`sqlx::Transaction`]: dropping it before commit, including when the
//! calling future is cancelled, rolls it back. Timestamps are stored as
//! RFC 3339 text.

use std::{str::FromStr, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use entities::{
    App, AppDraft, AppId, AppSummary, Course, CourseDraft, CourseId, CourseMembership,
    EnrollOutcome, Entry, EntryEdit, EntryFilter, EntryId, NewEntry, NewUser, ReconcileReport,
    Role, Stopword, StudentProfile, User, UserId,
};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    FromRow, Sqlite, SqliteConnection, SqlitePool, Transaction,
};

use crate::{ChainQuery, ChainSnapshot, DiaryStore, StopwordPlan, StoreError, StoreResult};

/// Schema, applied on every connect.
///
/// `app_courses.app_id` is the primary key of the binding table, so an app
/// can never be bound to more than one course.
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE COLLATE NOCASE,
    role TEXT NOT NULL CHECK (role IN ('student', 'professor'))
);

CREATE TABLE IF NOT EXISTS students (
    id INTEGER PRIMARY KEY REFERENCES users(id),
    email TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS professors (
    id INTEGER PRIMARY KEY REFERENCES users(id),
    email TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS courses (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    identifier TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS course_students (
    course_id INTEGER NOT NULL REFERENCES courses(id),
    student_id INTEGER NOT NULL REFERENCES students(id),
    PRIMARY KEY (course_id, student_id)
);

CREATE TABLE IF NOT EXISTS course_professors (
    course_id INTEGER NOT NULL REFERENCES courses(id),
    professor_id INTEGER NOT NULL REFERENCES professors(id),
    PRIMARY KEY (course_id, professor_id)
);

CREATE TABLE IF NOT EXISTS apps (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    intro TEXT NOT NULL,
    start_time TEXT NOT NULL,
    end_time TEXT NOT NULL,
    num_entries INTEGER NOT NULL,
    max_students INTEGER NOT NULL,
    template_link TEXT
);

CREATE TABLE IF NOT EXISTS app_courses (
    app_id INTEGER PRIMARY KEY REFERENCES apps(id),
    course_id INTEGER NOT NULL REFERENCES courses(id)
);

CREATE TABLE IF NOT EXISTS app_students (
    app_id INTEGER NOT NULL REFERENCES apps(id),
    student_id INTEGER NOT NULL REFERENCES students(id),
    PRIMARY KEY (app_id, student_id)
);

CREATE TABLE IF NOT EXISTS stopwords (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    app_id INTEGER NOT NULL REFERENCES apps(id),
    word TEXT NOT NULL,
    enabled INTEGER NOT NULL DEFAULT 1,
    UNIQUE (app_id, word)
);

CREATE TABLE IF NOT EXISTS entries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    student_id INTEGER NOT NULL REFERENCES students(id),
    app_id INTEGER NOT NULL REFERENCES apps(id),
    content TEXT NOT NULL,
    study_start_time TEXT,
    study_duration_minutes INTEGER,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_entries_app_student ON entries(app_id, student_id);
CREATE INDEX IF NOT EXISTS idx_app_courses_course ON app_courses(course_id);
"#;

const APP_COLUMNS: &str = "a.id, ac.course_id, a.name, a.intro, a.start_time, a.end_time, \
                           a.num_entries, a.max_students, a.template_link";

const ENTRY_COLUMNS: &str = "id, student_id, app_id, content, study_start_time, \
                             study_duration_minutes, created_at, updated_at";

// =============================================================================
// Rows
// =============================================================================

fn parse_time(value: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("invalid timestamp {:?}: {}", value, e)))
}

fn to_u32(value: i64, column: &str) -> StoreResult<u32> {
    u32::try_from(value)
        .map_err(|_| StoreError::Corrupt(format!("{} out of range: {}", column, value)))
}

#[derive(Debug, FromRow)]
struct UserRow {
    id: i64,
    first_name: String,
    last_name: String,
    email: String,
    role: String,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> StoreResult<Self> {
        let role = row
            .role
            .parse::<Role>()
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        Ok(User {
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            role,
        })
    }
}

#[derive(Debug, FromRow)]
struct CourseRow {
    id: i64,
    name: String,
    identifier: String,
}

impl From<CourseRow> for Course {
    fn from(row: CourseRow) -> Self {
        Course {
            id: row.id,
            name: row.name,
            identifier: row.identifier,
        }
    }
}

#[derive(Debug, FromRow)]
struct AppRow {
    id: i64,
    course_id: i64,
    name: String,
    intro: String,
    start_time: String,
    end_time: String,
    num_entries: i64,
    max_students: i64,
    template_link: Option<String>,
}

impl TryFrom<AppRow> for App {
    type Error = StoreError;

    fn try_from(row: AppRow) -> StoreResult<Self> {
        Ok(App {
            id: row.id,
            course_id: row.course_id,
            name: row.name,
            intro: row.intro,
            start_time: parse_time(&row.start_time)?,
            end_time: parse_time(&row.end_time)?,
            num_entries: to_u32(row.num_entries, "num_entries")?,
            max_students: to_u32(row.max_students, "max_students")?,
            template_link: row.template_link,
        })
    }
}

#[derive(Debug, FromRow)]
struct AppSummaryRow {
    #[sqlx(flatten)]
    app: AppRow,
    enrolled_count: i64,
}

#[derive(Debug, FromRow)]
struct StopwordRow {
    id: i64,
    app_id: i64,
    word: String,
    enabled: bool,
}

impl From<StopwordRow> for Stopword {
    fn from(row: StopwordRow) -> Self {
        Stopword {
            id: row.id,
            app_id: row.app_id,
            word: row.word,
            enabled: row.enabled,
        }
    }
}

#[derive(Debug, FromRow)]
struct EntryRow {
    id: i64,
    student_id: i64,
    app_id: i64,
    content: String,
    study_start_time: Option<String>,
    study_duration_minutes: Option<i64>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<EntryRow> for Entry {
    type Error = StoreError;

    fn try_from(row: EntryRow) -> StoreResult<Self> {
        Ok(Entry {
            id: row.id,
            student_id: row.student_id,
            app_id: row.app_id,
            content: row.content,
            study_start_time: row.study_start_time.as_deref().map(parse_time).transpose()?,
            study_duration_minutes: row
                .study_duration_minutes
                .map(|m| to_u32(m, "study_duration_minutes"))
                .transpose()?,
            created_at: parse_time(&row.created_at)?,
            updated_at: parse_time(&row.updated_at)?,
        })
    }
}

// =============================================================================
// Query helpers
// =============================================================================

async fn exists(conn: &mut SqliteConnection, sql: &str, a: i64, b: Option<i64>) -> StoreResult<bool> {
    let mut query = sqlx::query_scalar::<_, bool>(sql).bind(a);
    if let Some(b) = b {
        query = query.bind(b);
    }
    Ok(query.fetch_one(&mut *conn).await?)
}

async fn has_profile(conn: &mut SqliteConnection, user_id: UserId, role: Role) -> StoreResult<bool> {
    let sql = match role {
        Role::Student => "SELECT EXISTS(SELECT 1 FROM students WHERE id = ?)",
        Role::Professor => "SELECT EXISTS(SELECT 1 FROM professors WHERE id = ?)",
    };
    exists(conn, sql, user_id, None).await
}

async fn course_exists(conn: &mut SqliteConnection, course_id: CourseId) -> StoreResult<bool> {
    exists(conn, "SELECT EXISTS(SELECT 1 FROM courses WHERE id = ?)", course_id, None).await
}

async fn is_enrolled(conn: &mut SqliteConnection, app_id: AppId, user_id: UserId) -> StoreResult<bool> {
    exists(
        conn,
        "SELECT EXISTS(SELECT 1 FROM app_students WHERE app_id = ? AND student_id = ?)",
        app_id,
        Some(user_id),
    )
    .await
}

async fn membership(
    conn: &mut SqliteConnection,
    course_id: CourseId,
    user_id: UserId,
) -> StoreResult<CourseMembership> {
    Ok(CourseMembership {
        as_student: exists(
            conn,
            "SELECT EXISTS(SELECT 1 FROM course_students WHERE course_id = ? AND student_id = ?)",
            course_id,
            Some(user_id),
        )
        .await?,
        as_professor: exists(
            conn,
            "SELECT EXISTS(SELECT 1 FROM course_professors WHERE course_id = ? AND professor_id = ?)",
            course_id,
            Some(user_id),
        )
        .await?,
    })
}

async fn enrollment_count(conn: &mut SqliteConnection, app_id: AppId) -> StoreResult<u32> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM app_students WHERE app_id = ?")
        .bind(app_id)
        .fetch_one(&mut *conn)
        .await?;
    to_u32(count, "enrollment count")
}

async fn fetch_app(conn: &mut SqliteConnection, app_id: AppId) -> StoreResult<Option<App>> {
    let sql = format!(
        "SELECT {} FROM apps a JOIN app_courses ac ON ac.app_id = a.id WHERE a.id = ?",
        APP_COLUMNS
    );
    sqlx::query_as::<_, AppRow>(&sql)
        .bind(app_id)
        .fetch_optional(&mut *conn)
        .await?
        .map(App::try_from)
        .transpose()
}

async fn fetch_entry(conn: &mut SqliteConnection, entry_id: EntryId) -> StoreResult<Option<Entry>> {
    let sql = format!("SELECT {} FROM entries WHERE id = ?", ENTRY_COLUMNS);
    sqlx::query_as::<_, EntryRow>(&sql)
        .bind(entry_id)
        .fetch_optional(&mut *conn)
        .await?
        .map(Entry::try_from)
        .transpose()
}

async fn fetch_stopwords(conn: &mut SqliteConnection, app_id: AppId) -> StoreResult<Vec<Stopword>> {
    let rows = sqlx::query_as::<_, StopwordRow>(
        "SELECT id, app_id, word, enabled FROM stopwords WHERE app_id = ? ORDER BY id",
    )
    .bind(app_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows.into_iter().map(Stopword::from).collect())
}

// =============================================================================
// Transaction bodies
// =============================================================================

async fn create_user_tx(conn: &mut SqliteConnection, user: NewUser) -> StoreResult<User> {
    let taken: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = ?)")
        .bind(&user.email)
        .fetch_one(&mut *conn)
        .await?;
    if taken {
        return Err(StoreError::already_exists("User", &user.email));
    }

    let id = sqlx::query("INSERT INTO users (first_name, last_name, email, role) VALUES (?, ?, ?, ?)")
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(user.role.as_str())
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();

    let profile_sql = match user.role {
        Role::Student => "INSERT INTO students (id, email) VALUES (?, ?)",
        Role::Professor => "INSERT INTO professors (id, email) VALUES (?, ?)",
    };
    sqlx::query(profile_sql)
        .bind(id)
        .bind(&user.email)
        .execute(&mut *conn)
        .await?;

    Ok(User {
        id,
        first_name: user.first_name,
        last_name: user.last_name,
        email: user.email,
        role: user.role,
    })
}

async fn create_course_tx(
    conn: &mut SqliteConnection,
    draft: CourseDraft,
    professor_id: UserId,
) -> StoreResult<Course> {
    if !has_profile(conn, professor_id, Role::Professor).await? {
        return Err(StoreError::ForeignKeyViolation(format!(
            "user {} has no professor profile",
            professor_id
        )));
    }

    let id = sqlx::query("INSERT INTO courses (name, identifier) VALUES (?, ?)")
        .bind(&draft.name)
        .bind(&draft.identifier)
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();
    sqlx::query("INSERT INTO course_professors (course_id, professor_id) VALUES (?, ?)")
        .bind(id)
        .bind(professor_id)
        .execute(&mut *conn)
        .await?;

    Ok(Course {
        id,
        name: draft.name,
        identifier: draft.identifier,
    })
}

async fn bind_tx(
    conn: &mut SqliteConnection,
    course_id: CourseId,
    user_id: UserId,
    role: Role,
) -> StoreResult<bool> {
    if !course_exists(conn, course_id).await? {
        return Err(StoreError::not_found("Course", course_id));
    }
    if !has_profile(conn, user_id, role).await? {
        return Err(StoreError::ForeignKeyViolation(format!(
            "user {} has no {} profile",
            user_id, role
        )));
    }

    let sql = match role {
        Role::Student => "INSERT OR IGNORE INTO course_students (course_id, student_id) VALUES (?, ?)",
        Role::Professor => {
            "INSERT OR IGNORE INTO course_professors (course_id, professor_id) VALUES (?, ?)"
        }
    };
    let result = sqlx::query(sql)
        .bind(course_id)
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() == 1)
}

async fn enroll_tx(
    conn: &mut SqliteConnection,
    app_id: AppId,
    student_id: UserId,
) -> StoreResult<EnrollOutcome> {
    let max_students: Option<i64> = sqlx::query_scalar("SELECT max_students FROM apps WHERE id = ?")
        .bind(app_id)
        .fetch_optional(&mut *conn)
        .await?;
    let max_students = match max_students {
        Some(max) => to_u32(max, "max_students")?,
        None => return Err(StoreError::not_found("App", app_id)),
    };
    if !has_profile(conn, student_id, Role::Student).await? {
        return Err(StoreError::ForeignKeyViolation(format!(
            "user {} has no student profile",
            student_id
        )));
    }

    let enrolled_count = enrollment_count(conn, app_id).await?;
    if is_enrolled(conn, app_id, student_id).await? {
        return Ok(EnrollOutcome::AlreadyEnrolled { enrolled_count });
    }
    if enrolled_count >= max_students {
        return Ok(EnrollOutcome::CapacityExceeded { max_students });
    }

    sqlx::query("INSERT INTO app_students (app_id, student_id) VALUES (?, ?)")
        .bind(app_id)
        .bind(student_id)
        .execute(&mut *conn)
        .await?;
    Ok(EnrollOutcome::Enrolled {
        enrolled_count: enrolled_count + 1,
    })
}

async fn create_app_tx(
    conn: &mut SqliteConnection,
    course_id: CourseId,
    draft: AppDraft,
) -> StoreResult<App> {
    if !course_exists(conn, course_id).await? {
        return Err(StoreError::not_found("Course", course_id));
    }

    let id = sqlx::query(
        "INSERT INTO apps (name, intro, start_time, end_time, num_entries, max_students, \
         template_link) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&draft.name)
    .bind(&draft.intro)
    .bind(draft.start_time.to_rfc3339())
    .bind(draft.end_time.to_rfc3339())
    .bind(i64::from(draft.num_entries))
    .bind(i64::from(draft.max_students))
    .bind(&draft.template_link)
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();
    sqlx::query("INSERT INTO app_courses (app_id, course_id) VALUES (?, ?)")
        .bind(id)
        .bind(course_id)
        .execute(&mut *conn)
        .await?;

    Ok(App {
        id,
        course_id,
        name: draft.name,
        intro: draft.intro,
        start_time: draft.start_time,
        end_time: draft.end_time,
        num_entries: draft.num_entries,
        max_students: draft.max_students,
        template_link: draft.template_link,
    })
}

async fn update_app_tx(conn: &mut SqliteConnection, id: AppId, draft: AppDraft) -> StoreResult<App> {
    let result = sqlx::query(
        "UPDATE apps SET name = ?, intro = ?, start_time = ?, end_time = ?, num_entries = ?, \
         max_students = ?, template_link = ? WHERE id = ?",
    )
    .bind(&draft.name)
    .bind(&draft.intro)
    .bind(draft.start_time.to_rfc3339())
    .bind(draft.end_time.to_rfc3339())
    .bind(i64::from(draft.num_entries))
    .bind(i64::from(draft.max_students))
    .bind(&draft.template_link)
    .bind(id)
    .execute(&mut *conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::not_found("App", id));
    }

    fetch_app(conn, id)
        .await?
        .ok_or_else(|| StoreError::Corrupt(format!("app {} has no course binding", id)))
}

async fn reconcile_tx(
    conn: &mut SqliteConnection,
    app_id: AppId,
    desired: &[String],
) -> StoreResult<ReconcileReport> {
    if !exists(conn, "SELECT EXISTS(SELECT 1 FROM apps WHERE id = ?)", app_id, None).await? {
        return Err(StoreError::not_found("App", app_id));
    }

    let existing = fetch_stopwords(conn, app_id).await?;
    let plan = StopwordPlan::between(&existing, desired);

    for id in &plan.reenable {
        sqlx::query("UPDATE stopwords SET enabled = 1 WHERE id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await?;
    }
    for id in &plan.disable {
        sqlx::query("UPDATE stopwords SET enabled = 0 WHERE id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await?;
    }
    for word in &plan.insert {
        sqlx::query("INSERT INTO stopwords (app_id, word, enabled) VALUES (?, ?, 1)")
            .bind(app_id)
            .bind(word)
            .execute(&mut *conn)
            .await?;
    }

    Ok(plan.report())
}

async fn create_entry_tx(conn: &mut SqliteConnection, entry: NewEntry) -> StoreResult<Entry> {
    if !exists(conn, "SELECT EXISTS(SELECT 1 FROM apps WHERE id = ?)", entry.app_id, None).await? {
        return Err(StoreError::not_found("App", entry.app_id));
    }
    if !is_enrolled(conn, entry.app_id, entry.student_id).await? {
        return Err(StoreError::ForeignKeyViolation(format!(
            "student {} is not enrolled in app {}",
            entry.student_id, entry.app_id
        )));
    }

    let now = Utc::now();
    let id = sqlx::query(
        "INSERT INTO entries (student_id, app_id, content, study_start_time, \
         study_duration_minutes, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(entry.student_id)
    .bind(entry.app_id)
    .bind(&entry.content)
    .bind(entry.study_start_time.map(|t| t.to_rfc3339()))
    .bind(entry.study_duration_minutes.map(i64::from))
    .bind(now.to_rfc3339())
    .bind(now.to_rfc3339())
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    Ok(Entry {
        id,
        student_id: entry.student_id,
        app_id: entry.app_id,
        content: entry.content,
        study_start_time: entry.study_start_time,
        study_duration_minutes: entry.study_duration_minutes,
        created_at: now,
        updated_at: now,
    })
}

async fn update_entry_tx(conn: &mut SqliteConnection, id: EntryId, edit: EntryEdit) -> StoreResult<Entry> {
    let mut entry = fetch_entry(conn, id)
        .await?
        .ok_or_else(|| StoreError::not_found("Entry", id))?;
    entry.apply(edit, Utc::now());

    sqlx::query(
        "UPDATE entries SET content = ?, study_start_time = ?, study_duration_minutes = ?, \
         updated_at = ? WHERE id = ?",
    )
    .bind(&entry.content)
    .bind(entry.study_start_time.map(|t| t.to_rfc3339()))
    .bind(entry.study_duration_minutes.map(i64::from))
    .bind(entry.updated_at.to_rfc3339())
    .bind(id)
    .execute(&mut *conn)
    .await?;

    Ok(entry)
}

// =============================================================================
// Store
// =============================================================================

/// SQLite-backed diary store.
#[derive(Debug, Clone)]
pub struct SqliteDiaryStore {
    pool: SqlitePool,
}

impl SqliteDiaryStore {
    /// Connects to a SQLite database and applies the schema.
    ///
    /// Accepts any `sqlite:` URL. In-memory databases get a single pooled
    /// connection that is never recycled, since each connection would
    /// otherwise see its own empty database.
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let in_memory = url.contains(":memory:") || url.contains("mode=memory");

        let mut options = SqliteConnectOptions::from_str(url)?
            .foreign_keys(true)
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));
        if !in_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };
        let pool = pool_options.connect_with(options).await?;

        let store = Self { pool };
        store.run_migrations().await?;
        tracing::info!("Connected to SQLite database at {}", url);

        Ok(store)
    }

    /// Opens a fresh in-memory database.
    pub async fn connect_in_memory() -> StoreResult<Self> {
        Self::connect("sqlite::memory:").await
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Opens a write transaction holding the database write lock.
    async fn begin_write(&self) -> StoreResult<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin_with("BEGIN IMMEDIATE").await?)
    }

    async fn run_migrations(&self) -> StoreResult<()> {
        sqlx::raw_sql(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl DiaryStore for SqliteDiaryStore {
    // =========================================================================
    // User operations
    // =========================================================================

    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        let mut tx = self.begin_write().await?;
        let value = create_user_tx(&mut tx, user).await?;
        tx.commit().await?;
        Ok(value)
    }

    async fn get_user(&self, id: UserId) -> StoreResult<Option<User>> {
        sqlx::query_as::<_, UserRow>(
            "SELECT id, first_name, last_name, email, role FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(User::try_from)
        .transpose()
    }

    async fn get_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        sqlx::query_as::<_, UserRow>(
            "SELECT id, first_name, last_name, email, role FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?
        .map(User::try_from)
        .transpose()
    }

    async fn get_student_profile(&self, id: UserId) -> StoreResult<Option<StudentProfile>> {
        let mut tx = self.pool.begin().await?;
        let email: Option<String> = sqlx::query_scalar("SELECT email FROM students WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(email) = email else {
            return Ok(None);
        };

        let course_ids: Vec<CourseId> = sqlx::query_scalar(
            "SELECT course_id FROM course_students WHERE student_id = ? ORDER BY course_id",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;
        let enrolled_app_ids: Vec<AppId> =
            sqlx::query_scalar("SELECT app_id FROM app_students WHERE student_id = ? ORDER BY app_id")
                .bind(id)
                .fetch_all(&mut *tx)
                .await?;
        tx.commit().await?;

        Ok(Some(StudentProfile {
            id,
            email,
            course_ids,
            enrolled_app_ids,
        }))
    }

    // =========================================================================
    // Course operations
    // =========================================================================

    async fn create_course(
        &self,
        draft: CourseDraft,
        professor_id: UserId,
    ) -> StoreResult<Course> {
        let mut tx = self.begin_write().await?;
        let value = create_course_tx(&mut tx, draft, professor_id).await?;
        tx.commit().await?;
        Ok(value)
    }

    async fn update_course(&self, id: CourseId, draft: CourseDraft) -> StoreResult<Course> {
        sqlx::query_as::<_, CourseRow>(
            "UPDATE courses SET name = ?, identifier = ? WHERE id = ? \
             RETURNING id, name, identifier",
        )
        .bind(&draft.name)
        .bind(&draft.identifier)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(Course::from)
        .ok_or_else(|| StoreError::not_found("Course", id))
    }

    async fn list_courses_for(&self, user_id: UserId) -> StoreResult<Vec<Course>> {
        let rows = sqlx::query_as::<_, CourseRow>(
            "SELECT c.id, c.name, c.identifier FROM courses c \
             WHERE EXISTS (SELECT 1 FROM course_students cs \
                           WHERE cs.course_id = c.id AND cs.student_id = ?) \
                OR EXISTS (SELECT 1 FROM course_professors cp \
                           WHERE cp.course_id = c.id AND cp.professor_id = ?) \
             ORDER BY c.id",
        )
        .bind(user_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Course::from).collect())
    }

    // =========================================================================
    // Membership operations
    // =========================================================================

    async fn bind_to_course(
        &self,
        course_id: CourseId,
        user_id: UserId,
        role: Role,
    ) -> StoreResult<bool> {
        let mut tx = self.begin_write().await?;
        let value = bind_tx(&mut tx, course_id, user_id, role).await?;
        tx.commit().await?;
        Ok(value)
    }

    async fn enroll_in_app(
        &self,
        app_id: AppId,
        student_id: UserId,
    ) -> StoreResult<EnrollOutcome> {
        let mut tx = self.begin_write().await?;
        let value = enroll_tx(&mut tx, app_id, student_id).await?;
        tx.commit().await?;
        Ok(value)
    }

    async fn list_enrolled_app_ids(&self, student_id: UserId) -> StoreResult<Vec<AppId>> {
        Ok(
            sqlx::query_scalar("SELECT app_id FROM app_students WHERE student_id = ? ORDER BY app_id")
                .bind(student_id)
                .fetch_all(&self.pool)
                .await?,
        )
    }

    // =========================================================================
    // Hierarchy reads
    // =========================================================================

    async fn load_chain(&self, query: &ChainQuery) -> StoreResult<ChainSnapshot> {
        let mut tx = self.pool.begin().await?;

        let course = sqlx::query_as::<_, CourseRow>(
            "SELECT id, name, identifier FROM courses WHERE id = ?",
        )
        .bind(query.course_id)
        .fetch_optional(&mut *tx)
        .await?
        .map(Course::from);

        let mut snapshot = ChainSnapshot {
            course,
            membership: membership(&mut tx, query.course_id, query.user_id).await?,
            ..Default::default()
        };

        if let Some(app_id) = query.app_id {
            snapshot.app = fetch_app(&mut tx, app_id).await?;
            snapshot.app_enrolled = is_enrolled(&mut tx, app_id, query.user_id).await?;
            if let Some(subject_id) = query.subject_id {
                snapshot.subject_enrolled = is_enrolled(&mut tx, app_id, subject_id).await?;
            }
        }
        if let Some(subject_id) = query.subject_id {
            snapshot.subject_membership = membership(&mut tx, query.course_id, subject_id).await?;
        }
        if let Some(entry_id) = query.entry_id {
            snapshot.entry = fetch_entry(&mut tx, entry_id).await?;
        }

        tx.commit().await?;
        Ok(snapshot)
    }

    // =========================================================================
    // App operations
    // =========================================================================

    async fn create_app(&self, course_id: CourseId, draft: AppDraft) -> StoreResult<App> {
        let mut tx = self.begin_write().await?;
        let value = create_app_tx(&mut tx, course_id, draft).await?;
        tx.commit().await?;
        Ok(value)
    }

    async fn create_app_with_stopwords(
        &self,
        course_id: CourseId,
        draft: AppDraft,
        stopwords: &[String],
    ) -> StoreResult<(App, ReconcileReport)> {
        let mut tx = self.begin_write().await?;
        let app = create_app_tx(&mut tx, course_id, draft).await?;
        let report = reconcile_tx(&mut tx, app.id, stopwords).await?;
        tx.commit().await?;
        Ok((app, report))
    }

    async fn update_app_with_stopwords(
        &self,
        id: AppId,
        draft: AppDraft,
        stopwords: &[String],
    ) -> StoreResult<(App, ReconcileReport)> {
        let mut tx = self.begin_write().await?;
        let app = update_app_tx(&mut tx, id, draft).await?;
        let report = reconcile_tx(&mut tx, id, stopwords).await?;
        tx.commit().await?;
        Ok((app, report))
    }

    async fn list_apps(&self, course_id: CourseId) -> StoreResult<Vec<AppSummary>> {
        let sql = format!(
            "SELECT {}, (SELECT COUNT(*) FROM app_students s WHERE s.app_id = a.id) AS \
             enrolled_count FROM apps a JOIN app_courses ac ON ac.app_id = a.id \
             WHERE ac.course_id = ? ORDER BY a.id",
            APP_COLUMNS
        );
        let rows = sqlx::query_as::<_, AppSummaryRow>(&sql)
            .bind(course_id)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|row| {
                Ok(AppSummary {
                    enrolled_count: to_u32(row.enrolled_count, "enrolled_count")?,
                    app: App::try_from(row.app)?,
                })
            })
            .collect()
    }

    async fn enrollment_count(&self, app_id: AppId) -> StoreResult<u32> {
        let mut conn = self.pool.acquire().await?;
        if !exists(&mut conn, "SELECT EXISTS(SELECT 1 FROM apps WHERE id = ?)", app_id, None).await? {
            return Err(StoreError::not_found("App", app_id));
        }
        enrollment_count(&mut conn, app_id).await
    }

    // =========================================================================
    // Stopword operations
    // =========================================================================

    async fn list_stopwords(&self, app_id: AppId) -> StoreResult<Vec<Stopword>> {
        let mut conn = self.pool.acquire().await?;
        fetch_stopwords(&mut conn, app_id).await
    }

    async fn reconcile_stopwords(
        &self,
        app_id: AppId,
        desired: &[String],
    ) -> StoreResult<ReconcileReport> {
        let mut tx = self.begin_write().await?;
        let value = reconcile_tx(&mut tx, app_id, desired).await?;
        tx.commit().await?;
        Ok(value)
    }

    // =========================================================================
    // Entry operations
    // =========================================================================

    async fn create_entry(&self, entry: NewEntry) -> StoreResult<Entry> {
        let mut tx = self.begin_write().await?;
        let value = create_entry_tx(&mut tx, entry).await?;
        tx.commit().await?;
        Ok(value)
    }

    async fn update_entry(&self, id: EntryId, edit: EntryEdit) -> StoreResult<Entry> {
        let mut tx = self.begin_write().await?;
        let value = update_entry_tx(&mut tx, id, edit).await?;
        tx.commit().await?;
        Ok(value)
    }

    async fn list_entries(&self, app_id: AppId, filter: &EntryFilter) -> StoreResult<Vec<Entry>> {
        let sql = format!(
            "SELECT {} FROM entries WHERE app_id = ? AND (? IS NULL OR student_id = ?) ORDER BY id",
            ENTRY_COLUMNS
        );
        let rows = sqlx::query_as::<_, EntryRow>(&sql)
            .bind(app_id)
            .bind(filter.student_id)
            .bind(filter.student_id)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Entry::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration as ChronoDuration;
    use tempfile::TempDir;

    use super::*;

    /// A store on a database file, so the pool really hands out several
    /// connections.
    async fn file_store() -> (SqliteDiaryStore, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("diary.db").display());
        let store = SqliteDiaryStore::connect(&url).await.unwrap();
        (store, dir)
    }

    async fn student(store: &SqliteDiaryStore, email: &str) -> User {
        store
            .create_user(NewUser::new("Sam", "Student", email, Role::Student))
            .await
            .unwrap()
    }

    async fn setup() -> (SqliteDiaryStore, User, Course) {
        let store = SqliteDiaryStore::connect_in_memory().await.unwrap();
        let professor = store
            .create_user(NewUser::new("Pat", "Prof", "p@example.edu", Role::Professor))
            .await
            .unwrap();
        let course = store
            .create_course(CourseDraft::new("Diaries", "PSY 101"), professor.id)
            .await
            .unwrap();
        (store, professor, course)
    }

    fn app_draft(max_students: u32) -> AppDraft {
        let start = Utc::now();
        AppDraft {
            name: "Reflections".to_string(),
            intro: "Weekly study diary".to_string(),
            start_time: start,
            end_time: start + ChronoDuration::days(14),
            num_entries: 4,
            max_students,
            template_link: Some("https://example.edu/template".to_string()),
        }
    }

    #[tokio::test]
    async fn test_user_round_trip_and_duplicate_email() {
        let (store, professor, _) = setup().await;

        let loaded = store.get_user_by_email("p@example.edu").await.unwrap();
        assert_eq!(loaded, Some(professor));

        let result = store
            .create_user(NewUser::new("Again", "Prof", "p@example.edu", Role::Student))
            .await;
        assert!(matches!(result, Err(StoreError::AlreadyExists { .. })));
    }

    #[tokio::test]
    async fn test_email_is_case_insensitive() {
        let (store, professor, _) = setup().await;

        let loaded = store.get_user_by_email("P@Example.EDU").await.unwrap();
        assert_eq!(loaded.map(|u| u.id), Some(professor.id));

        let result = store
            .create_user(NewUser::new("Again", "Prof", "P@EXAMPLE.edu", Role::Student))
            .await;
        assert!(matches!(result, Err(StoreError::AlreadyExists { .. })));
    }

    #[tokio::test]
    async fn test_enrollment_scenario() {
        let (store, _, course) = setup().await;
        let app = store.create_app(course.id, app_draft(2)).await.unwrap();
        let mut students = Vec::new();
        for i in 0..3 {
            let email = format!("s{}@example.edu", i);
            students.push(
                store
                    .create_user(NewUser::new("Sam", "Student", email, Role::Student))
                    .await
                    .unwrap(),
            );
        }

        assert_eq!(
            store.enroll_in_app(app.id, students[0].id).await.unwrap(),
            EnrollOutcome::Enrolled { enrolled_count: 1 }
        );
        assert_eq!(
            store.enroll_in_app(app.id, students[0].id).await.unwrap(),
            EnrollOutcome::AlreadyEnrolled { enrolled_count: 1 }
        );
        assert_eq!(
            store.enroll_in_app(app.id, students[1].id).await.unwrap(),
            EnrollOutcome::Enrolled { enrolled_count: 2 }
        );
        assert_eq!(
            store.enroll_in_app(app.id, students[2].id).await.unwrap(),
            EnrollOutcome::CapacityExceeded { max_students: 2 }
        );

        let summaries = store.list_apps(course.id).await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].enrolled_count, 2);
        assert_eq!(summaries[0].app, app);
    }

    #[tokio::test]
    async fn test_failed_transaction_is_rolled_back() {
        let (store, professor, _) = setup().await;

        // The connection must be usable again after the rollback.
        let missing = store.enroll_in_app(999, professor.id).await;
        assert!(matches!(missing, Err(StoreError::NotFound { .. })));

        let course = store
            .create_course(CourseDraft::new("Second", "PSY 102"), professor.id)
            .await
            .unwrap();
        assert_eq!(store.list_courses_for(professor.id).await.unwrap().len(), 2);
        assert_eq!(course.name, "Second");
    }

    #[tokio::test]
    async fn test_reconcile_scenario() {
        let (store, _, course) = setup().await;
        let app = store.create_app(course.id, app_draft(10)).await.unwrap();

        store
            .reconcile_stopwords(app.id, &["the".to_string(), "a".to_string()])
            .await
            .unwrap();
        let report = store
            .reconcile_stopwords(app.id, &["a".to_string()])
            .await
            .unwrap();
        assert_eq!(report.disabled, 1);

        let report = store
            .reconcile_stopwords(app.id, &["a".to_string(), "The".to_string()])
            .await
            .unwrap();
        assert_eq!((report.reenabled, report.inserted), (1, 0));

        let rows = store.list_stopwords(app.id).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.enabled));
    }

    #[tokio::test]
    async fn test_entries_and_snapshot() {
        let (store, professor, course) = setup().await;
        let app = store.create_app(course.id, app_draft(10)).await.unwrap();
        let student = store
            .create_user(NewUser::new("Sam", "Student", "s@example.edu", Role::Student))
            .await
            .unwrap();
        store
            .bind_to_course(course.id, student.id, Role::Student)
            .await
            .unwrap();
        store.enroll_in_app(app.id, student.id).await.unwrap();

        let entry = store
            .create_entry(NewEntry {
                student_id: student.id,
                app_id: app.id,
                content: "Reviewed chapter three".to_string(),
                study_start_time: Some(Utc::now()),
                study_duration_minutes: Some(50),
            })
            .await
            .unwrap();

        let edited = store
            .update_entry(
                entry.id,
                EntryEdit {
                    content: "Reviewed chapters three and four".to_string(),
                    study_start_time: None,
                    study_duration_minutes: Some(80),
                },
            )
            .await
            .unwrap();
        assert_eq!(edited.student_id, student.id);
        assert_eq!(edited.study_duration_minutes, Some(80));

        let snapshot = store
            .load_chain(
                &ChainQuery::course(professor.id, course.id)
                    .app(app.id)
                    .entry(entry.id)
                    .subject(student.id),
            )
            .await
            .unwrap();
        assert!(snapshot.membership.as_professor);
        assert!(snapshot.subject_membership.as_student);
        assert!(snapshot.subject_enrolled);
        assert_eq!(snapshot.app.map(|a| a.course_id), Some(course.id));
        assert_eq!(
            snapshot.entry.map(|e| e.content),
            Some("Reviewed chapters three and four".to_string())
        );

        let all = store.list_entries(app.id, &EntryFilter::new()).await.unwrap();
        let none = store
            .list_entries(app.id, &EntryFilter::new().with_student(professor.id))
            .await
            .unwrap();
        assert_eq!(all.len(), 1);
        assert!(none.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancelled_write_leaves_pool_usable() {
        let (store, _dir) = file_store().await;
        let professor = store
            .create_user(NewUser::new("Pat", "Prof", "p@example.edu", Role::Professor))
            .await
            .unwrap();

        for i in 0..40u64 {
            let delay = Duration::from_micros(i * 5);
            let write = store.create_course(CourseDraft::new("Cut short", "PSY 0"), professor.id);
            let _ = tokio::time::timeout(delay, write).await;

            store
                .create_course(CourseDraft::new("Diaries", format!("PSY {}", i)), professor.id)
                .await
                .unwrap_or_else(|e| panic!("write after cancel at {:?} failed: {}", delay, e));
        }

        // A cancelled course never survives without its professor binding.
        let courses: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM courses")
            .fetch_one(store.pool())
            .await
            .unwrap();
        let bound: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM course_professors")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(courses, bound);
    }

    #[tokio::test]
    async fn test_app_and_stopwords_commit_together() {
        let (store, _, course) = setup().await;
        let words = vec!["the".to_string(), "um".to_string()];

        let (app, report) = store
            .create_app_with_stopwords(course.id, app_draft(10), &words)
            .await
            .unwrap();
        assert_eq!(report.inserted, 2);

        let mut draft = app_draft(20);
        draft.name = "Renamed".to_string();
        let (updated, report) = store
            .update_app_with_stopwords(app.id, draft, &["um".to_string()])
            .await
            .unwrap();
        assert_eq!(updated.max_students, 20);
        assert_eq!(report.disabled, 1);

        let missing = store
            .update_app_with_stopwords(app.id + 1, app_draft(5), &words)
            .await;
        assert!(matches!(missing, Err(StoreError::NotFound { .. })));
        let orphan = store.create_app_with_stopwords(course.id + 1, app_draft(5), &words).await;
        assert!(matches!(orphan, Err(StoreError::NotFound { .. })));

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM stopwords")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(rows, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancelled_app_create_never_loses_its_stopwords() {
        let (store, _dir) = file_store().await;
        let professor = store
            .create_user(NewUser::new("Pat", "Prof", "p@example.edu", Role::Professor))
            .await
            .unwrap();
        let course = store
            .create_course(CourseDraft::new("Diaries", "PSY 101"), professor.id)
            .await
            .unwrap();
        let words = vec!["the".to_string(), "a".to_string()];

        for i in 0..40u64 {
            let write = store.create_app_with_stopwords(course.id, app_draft(5), &words);
            let _ = tokio::time::timeout(Duration::from_micros(i * 5), write).await;
        }

        let bare: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM apps a WHERE (SELECT COUNT(*) FROM stopwords s \
             WHERE s.app_id = a.id) <> 2",
        )
        .fetch_one(store.pool())
        .await
        .unwrap();
        assert_eq!(bare, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_enrollment_respects_capacity() {
        let (store, _dir) = file_store().await;
        let professor = store
            .create_user(NewUser::new("Pat", "Prof", "p@example.edu", Role::Professor))
            .await
            .unwrap();
        let course = store
            .create_course(CourseDraft::new("Diaries", "PSY 101"), professor.id)
            .await
            .unwrap();
        let store = Arc::new(store);

        for round in 0..5 {
            let app_id = store.create_app(course.id, app_draft(1)).await.unwrap().id;
            let s1 = student(&store, &format!("a{}@example.edu", round)).await.id;
            let s2 = student(&store, &format!("b{}@example.edu", round)).await.id;

            let a = tokio::spawn({
                let store = store.clone();
                async move { store.enroll_in_app(app_id, s1).await.unwrap() }
            });
            let b = tokio::spawn({
                let store = store.clone();
                async move { store.enroll_in_app(app_id, s2).await.unwrap() }
            });
            let outcomes = [a.await.unwrap(), b.await.unwrap()];

            assert!(outcomes.contains(&EnrollOutcome::Enrolled { enrolled_count: 1 }));
            assert!(outcomes.contains(&EnrollOutcome::CapacityExceeded { max_students: 1 }));
            assert_eq!(store.enrollment_count(app_id).await.unwrap(), 1);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_reconcile_keeps_one_row_per_word() {
        let (store, _dir) = file_store().await;
        let professor = store
            .create_user(NewUser::new("Pat", "Prof", "p@example.edu", Role::Professor))
            .await
            .unwrap();
        let course = store
            .create_course(CourseDraft::new("Diaries", "PSY 101"), professor.id)
            .await
            .unwrap();
        let app_id = store.create_app(course.id, app_draft(10)).await.unwrap().id;
        let store = Arc::new(store);

        let first = vec!["the".to_string(), "a".to_string()];
        let second = vec!["a".to_string(), "an".to_string()];
        let a = tokio::spawn({
            let (store, words) = (store.clone(), first.clone());
            async move { store.reconcile_stopwords(app_id, &words).await.unwrap() }
        });
        let b = tokio::spawn({
            let (store, words) = (store.clone(), second.clone());
            async move { store.reconcile_stopwords(app_id, &words).await.unwrap() }
        });
        a.await.unwrap();
        b.await.unwrap();

        let rows = store.list_stopwords(app_id).await.unwrap();
        let mut words: Vec<&str> = rows.iter().map(|r| r.word.as_str()).collect();
        words.sort_unstable();
        assert_eq!(words, ["a", "an", "the"]);

        // Whichever ran last decides the enabled set.
        let mut enabled: Vec<String> = rows
            .iter()
            .filter(|r| r.enabled)
            .map(|r| r.word.clone())
            .collect();
        enabled.sort_unstable();
        let mut first_sorted = first;
        first_sorted.sort_unstable();
        let mut second_sorted = second;
        second_sorted.sort_unstable();
        assert!(enabled == first_sorted || enabled == second_sorted, "{:?}", enabled);
    }
}
