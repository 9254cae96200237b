use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;

use crate::error::{AppError, AppResult};
use crate::models::{ForumMessage, Professor, ProfessorSummary, Rating, UserProfile, UserRating};

/// SQLx-backed storage layer. Handlers treat this as an opaque query
/// surface; all schema knowledge lives here.
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> AppResult<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .map_err(|e| AppError::storage("Failed to connect to database", e))?;
        Ok(Self { pool })
    }

    /// In-memory database for tests. A single connection keeps the
    /// schema alive for the lifetime of the pool.
    pub async fn new_in_memory() -> AppResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| AppError::storage("Failed to connect to in-memory database", e))?;
        let db = Self { pool };
        db.init().await?;
        Ok(db)
    }

    /// Idempotent schema bootstrap. Safe to call on every startup and
    /// from the setup endpoint.
    pub async fn init(&self) -> AppResult<()> {
        let statements = [
            "CREATE TABLE IF NOT EXISTS professors (
                id TEXT PRIMARY KEY,
                first_name TEXT NOT NULL,
                last_name TEXT NOT NULL,
                title TEXT NOT NULL,
                department TEXT NOT NULL,
                email TEXT,
                office_location TEXT,
                courses TEXT,
                bio TEXT,
                created_by TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS professor_ratings (
                id TEXT PRIMARY KEY,
                professor_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                course_code TEXT NOT NULL,
                is_online INTEGER NOT NULL DEFAULT 0,
                rating INTEGER NOT NULL,
                difficulty INTEGER NOT NULL,
                would_take_again INTEGER NOT NULL,
                for_credit INTEGER,
                used_textbooks INTEGER,
                attendance_mandatory INTEGER,
                grade TEXT,
                tags TEXT NOT NULL DEFAULT '[]',
                review TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                first_name TEXT NOT NULL,
                last_name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                password TEXT NOT NULL,
                student_id TEXT,
                graduation_year TEXT,
                major TEXT,
                created_at INTEGER NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS sessions (
                token TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS forum_messages (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                username TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_professors_department
                ON professors(department)",
            "CREATE INDEX IF NOT EXISTS idx_professors_created_at
                ON professors(created_at)",
            // Backstop for the read-before-write duplicate check.
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_ratings_professor_user
                ON professor_ratings(professor_id, user_id)",
            "CREATE INDEX IF NOT EXISTS idx_ratings_professor_created
                ON professor_ratings(professor_id, created_at)",
            "CREATE INDEX IF NOT EXISTS idx_ratings_user_created
                ON professor_ratings(user_id, created_at)",
            "CREATE INDEX IF NOT EXISTS idx_forum_created_at
                ON forum_messages(created_at)",
        ];

        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| AppError::storage("Failed to set up database schema", e))?;
        }

        Ok(())
    }

    // Professors

    pub async fn insert_professor(&self, professor: &Professor) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO professors (id, first_name, last_name, title, department,
                email, office_location, courses, bio, created_by, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&professor.id)
        .bind(&professor.first_name)
        .bind(&professor.last_name)
        .bind(&professor.title)
        .bind(&professor.department)
        .bind(&professor.email)
        .bind(&professor.office_location)
        .bind(&professor.courses)
        .bind(&professor.bio)
        .bind(&professor.created_by)
        .bind(professor.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::storage("Failed to create professor", e))?;

        Ok(())
    }

    pub async fn list_professors(&self) -> AppResult<Vec<Professor>> {
        let rows = sqlx::query("SELECT * FROM professors ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::storage("Failed to fetch professors", e))?;

        Ok(rows.iter().map(professor_from_row).collect())
    }

    pub async fn professors_by_department(&self, department: &str) -> AppResult<Vec<Professor>> {
        let rows =
            sqlx::query("SELECT * FROM professors WHERE department = ? ORDER BY created_at DESC")
                .bind(department)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| AppError::storage("Failed to fetch professors", e))?;

        Ok(rows.iter().map(professor_from_row).collect())
    }

    /// Case-insensitive substring match on name and department.
    pub async fn search_professors(&self, query: &str) -> AppResult<Vec<Professor>> {
        let pattern = format!("%{}%", query.to_lowercase());
        let rows = sqlx::query(
            "SELECT * FROM professors
             WHERE lower(first_name) LIKE ?
                OR lower(last_name) LIKE ?
                OR lower(department) LIKE ?
             ORDER BY created_at DESC",
        )
        .bind(&pattern)
        .bind(&pattern)
        .bind(&pattern)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::storage("Failed to search professors", e))?;

        Ok(rows.iter().map(professor_from_row).collect())
    }

    pub async fn get_professor(&self, id: &str) -> AppResult<Option<Professor>> {
        let row = sqlx::query("SELECT * FROM professors WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::storage("Failed to fetch professor", e))?;

        Ok(row.as_ref().map(professor_from_row))
    }

    // Ratings

    pub async fn insert_rating(&self, rating: &Rating) -> AppResult<()> {
        let tags = serde_json::to_string(&rating.tags)
            .map_err(|e| AppError::Internal(format!("Failed to encode tags: {}", e)))?;

        sqlx::query(
            "INSERT INTO professor_ratings (id, professor_id, user_id, course_code,
                is_online, rating, difficulty, would_take_again, for_credit,
                used_textbooks, attendance_mandatory, grade, tags, review, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&rating.id)
        .bind(&rating.professor_id)
        .bind(&rating.user_id)
        .bind(&rating.course_code)
        .bind(rating.is_online)
        .bind(rating.rating)
        .bind(rating.difficulty)
        .bind(rating.would_take_again)
        .bind(rating.for_credit)
        .bind(rating.used_textbooks)
        .bind(rating.attendance_mandatory)
        .bind(&rating.grade)
        .bind(&tags)
        .bind(&rating.review)
        .bind(rating.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::storage("Failed to create rating", e))?;

        Ok(())
    }

    pub async fn find_rating(
        &self,
        professor_id: &str,
        user_id: &str,
    ) -> AppResult<Option<Rating>> {
        let row = sqlx::query(
            "SELECT * FROM professor_ratings WHERE professor_id = ? AND user_id = ?",
        )
        .bind(professor_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::storage("Failed to fetch rating", e))?;

        Ok(row.as_ref().map(rating_from_row))
    }

    pub async fn ratings_for_professor(&self, professor_id: &str) -> AppResult<Vec<Rating>> {
        let rows = sqlx::query(
            "SELECT * FROM professor_ratings WHERE professor_id = ? ORDER BY created_at DESC",
        )
        .bind(professor_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::storage("Failed to fetch ratings", e))?;

        Ok(rows.iter().map(rating_from_row).collect())
    }

    pub async fn ratings_for_user(&self, user_id: &str) -> AppResult<Vec<UserRating>> {
        let rows = sqlx::query(
            "SELECT r.*,
                    p.id AS p_id,
                    p.first_name AS p_first_name,
                    p.last_name AS p_last_name,
                    p.title AS p_title,
                    p.department AS p_department
             FROM professor_ratings r
             JOIN professors p ON p.id = r.professor_id
             WHERE r.user_id = ?
             ORDER BY r.created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::storage("Failed to fetch user ratings", e))?;

        Ok(rows
            .iter()
            .map(|row| UserRating {
                rating: rating_from_row(row),
                professor: ProfessorSummary {
                    id: row.get("p_id"),
                    first_name: row.get("p_first_name"),
                    last_name: row.get("p_last_name"),
                    title: row.get("p_title"),
                    department: row.get("p_department"),
                },
            })
            .collect())
    }

    // Users and sessions

    pub async fn insert_user(&self, user: &UserProfile, password: &str) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO users (id, first_name, last_name, email, password,
                student_id, graduation_year, major, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&user.id)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(password)
        .bind(&user.student_id)
        .bind(&user.graduation_year)
        .bind(&user.major)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::storage("Failed to create account", e))?;

        Ok(())
    }

    /// Returns the profile and stored credential for an email, if any.
    pub async fn find_user_by_email(
        &self,
        email: &str,
    ) -> AppResult<Option<(UserProfile, String)>> {
        let row = sqlx::query("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::storage("Failed to fetch account", e))?;

        Ok(row
            .as_ref()
            .map(|row| (user_from_row(row), row.get("password"))))
    }

    pub async fn insert_session(
        &self,
        token: &str,
        user_id: &str,
        created_at: i64,
    ) -> AppResult<()> {
        sqlx::query("INSERT INTO sessions (token, user_id, created_at) VALUES (?, ?, ?)")
            .bind(token)
            .bind(user_id)
            .bind(created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::storage("Failed to create session", e))?;

        Ok(())
    }

    /// Resolve a bearer token to the user it was issued for.
    pub async fn user_for_token(&self, token: &str) -> AppResult<Option<UserProfile>> {
        let row = sqlx::query(
            "SELECT u.* FROM users u
             JOIN sessions s ON s.user_id = u.id
             WHERE s.token = ?",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::storage("Failed to resolve session", e))?;

        Ok(row.as_ref().map(user_from_row))
    }

    // Forum

    pub async fn insert_forum_message(&self, message: &ForumMessage) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO forum_messages (id, user_id, username, content, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&message.id)
        .bind(&message.user_id)
        .bind(&message.username)
        .bind(&message.content)
        .bind(message.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::storage("Failed to post message", e))?;

        Ok(())
    }

    /// Unexpired messages, oldest first.
    pub async fn forum_messages_since(&self, cutoff: i64) -> AppResult<Vec<ForumMessage>> {
        let rows = sqlx::query(
            "SELECT * FROM forum_messages WHERE created_at >= ? ORDER BY created_at ASC",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::storage("Failed to fetch messages", e))?;

        Ok(rows
            .iter()
            .map(|row| ForumMessage {
                id: row.get("id"),
                user_id: row.get("user_id"),
                username: row.get("username"),
                content: row.get("content"),
                created_at: row.get("created_at"),
            })
            .collect())
    }

    pub async fn purge_forum_messages_before(&self, cutoff: i64) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM forum_messages WHERE created_at < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::storage("Failed to purge expired messages", e))?;

        Ok(result.rows_affected())
    }
}

fn professor_from_row(row: &SqliteRow) -> Professor {
    Professor {
        id: row.get("id"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        title: row.get("title"),
        department: row.get("department"),
        email: row.get("email"),
        office_location: row.get("office_location"),
        courses: row.get("courses"),
        bio: row.get("bio"),
        created_by: row.get("created_by"),
        created_at: row.get("created_at"),
    }
}

fn rating_from_row(row: &SqliteRow) -> Rating {
    // A malformed tag column contributes no tags rather than failing the read.
    let tags: Vec<String> =
        serde_json::from_str(row.get::<String, _>("tags").as_str()).unwrap_or_default();

    Rating {
        id: row.get("id"),
        professor_id: row.get("professor_id"),
        user_id: row.get("user_id"),
        course_code: row.get("course_code"),
        is_online: row.get("is_online"),
        rating: row.get("rating"),
        difficulty: row.get("difficulty"),
        would_take_again: row.get("would_take_again"),
        for_credit: row.get("for_credit"),
        used_textbooks: row.get("used_textbooks"),
        attendance_mandatory: row.get("attendance_mandatory"),
        grade: row.get("grade"),
        tags,
        review: row.get("review"),
        created_at: row.get("created_at"),
    }
}

fn user_from_row(row: &SqliteRow) -> UserProfile {
    UserProfile {
        id: row.get("id"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        email: row.get("email"),
        student_id: row.get("student_id"),
        graduation_year: row.get("graduation_year"),
        major: row.get("major"),
        created_at: row.get("created_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_rating(professor_id: &str, user_id: &str) -> Rating {
        Rating {
            id: uuid::Uuid::new_v4().to_string(),
            professor_id: professor_id.to_string(),
            user_id: user_id.to_string(),
            course_code: "CSCE 2100".to_string(),
            is_online: false,
            rating: 4,
            difficulty: 3,
            would_take_again: true,
            for_credit: Some(true),
            used_textbooks: None,
            attendance_mandatory: None,
            grade: Some("A".to_string()),
            tags: vec!["Caring".to_string(), "Funny".to_string()],
            review: "Good course".to_string(),
            created_at: 1_700_000_000,
        }
    }

    #[tokio::test]
    async fn rating_round_trips_with_tags() {
        let db = Database::new_in_memory().await.unwrap();
        let rating = sample_rating("prof-1", "user-1");
        db.insert_rating(&rating).await.unwrap();

        let found = db.find_rating("prof-1", "user-1").await.unwrap().unwrap();
        assert_eq!(found.tags, vec!["Caring", "Funny"]);
        assert_eq!(found.for_credit, Some(true));
        assert_eq!(found.used_textbooks, None);
        assert_eq!(found.grade.as_deref(), Some("A"));
    }

    #[tokio::test]
    async fn malformed_tag_column_reads_as_no_tags() {
        let db = Database::new_in_memory().await.unwrap();
        let rating = sample_rating("prof-1", "user-1");
        db.insert_rating(&rating).await.unwrap();

        sqlx::query("UPDATE professor_ratings SET tags = 'not-a-json-array' WHERE id = ?")
            .bind(&rating.id)
            .execute(&db.pool)
            .await
            .unwrap();

        let found = db.find_rating("prof-1", "user-1").await.unwrap().unwrap();
        assert!(found.tags.is_empty());
    }

    #[tokio::test]
    async fn unique_index_backstops_duplicate_ratings() {
        let db = Database::new_in_memory().await.unwrap();
        db.insert_rating(&sample_rating("prof-1", "user-1"))
            .await
            .unwrap();

        let err = db
            .insert_rating(&sample_rating("prof-1", "user-1"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to create rating"));
    }
}
