//! Teacher directory.

use jobsara_core::{AccountId, Role};
use serde::{Deserialize, Serialize};

use crate::accounts::{AccountService, Registration};
use crate::auth::AuthError;
use crate::model::{Account, Course, NewCourse};

const DEFAULT_LIMIT: usize = 10;
const DEFAULT_LANDING_LIMIT: usize = 5;

/// Directory listing filters.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TeacherQuery {
    /// Case-insensitive match on name, username or bio.
    pub search: Option<String>,
    /// Minimum rating.
    pub min_rating: Option<f64>,
    /// Page size.
    pub limit: Option<usize>,
    /// Page offset.
    pub offset: Option<usize>,
}

/// Teacher as listed in the directory.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherCard {
    /// Account ID.
    pub id: AccountId,
    /// Username.
    pub username: String,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Biography.
    pub bio: Option<String>,
    /// Rating.
    pub rating: f64,
    /// Number of courses taught.
    pub course_count: usize,
}

impl TeacherCard {
    fn new(account: Account, course_count: usize) -> Self {
        Self {
            id: account.id,
            username: account.username,
            first_name: account.first_name,
            last_name: account.last_name,
            bio: account.bio,
            rating: account.rating,
            course_count,
        }
    }

    fn matches(&self, needle: &str) -> bool {
        [
            Some(self.username.as_str()),
            Some(self.first_name.as_str()),
            Some(self.last_name.as_str()),
            self.bio.as_deref(),
        ]
        .into_iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(needle))
    }
}

/// Teacher listing, details and course management.
#[derive(Debug, Clone)]
pub struct TeacherDirectory {
    accounts: AccountService,
}

impl TeacherDirectory {
    /// Create a directory over the account service.
    #[must_use]
    pub const fn new(accounts: AccountService) -> Self {
        Self { accounts }
    }

    async fn course_count(&self, teacher_id: AccountId) -> Result<usize, AuthError> {
        let sessions = self.accounts.sessions();
        sessions
            .store_call("count_courses", sessions.store().count_courses(teacher_id))
            .await
    }

    async fn cards(&self) -> Result<Vec<TeacherCard>, AuthError> {
        let mut cards = Vec::new();
        for account in self.accounts.all().await? {
            if account.role != Role::Teacher {
                continue;
            }
            let courses = self.course_count(account.id).await?;
            cards.push(TeacherCard::new(account, courses));
        }
        cards.sort_by(|a, b| b.rating.total_cmp(&a.rating).then(a.id.cmp(&b.id)));
        Ok(cards)
    }

    /// Filtered, rating-ordered page of teachers.
    ///
    /// Teachers without courses are only visible to admins.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::StoreUnavailable`] on store failure.
    pub async fn list(
        &self,
        query: &TeacherQuery,
        include_without_courses: bool,
    ) -> Result<Vec<TeacherCard>, AuthError> {
        let needle = query
            .search
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());

        Ok(self
            .cards()
            .await?
            .into_iter()
            .filter(|card| include_without_courses || card.course_count > 0)
            .filter(|card| query.min_rating.is_none_or(|min| card.rating >= min))
            .filter(|card| needle.as_deref().is_none_or(|n| card.matches(n)))
            .skip(query.offset.unwrap_or(0))
            .take(query.limit.unwrap_or(DEFAULT_LIMIT))
            .collect())
    }

    /// Public landing page cards: top-rated teachers with at least one course.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::StoreUnavailable`] on store failure.
    pub async fn landing(&self, limit: Option<usize>) -> Result<Vec<TeacherCard>, AuthError> {
        self.list(
            &TeacherQuery {
                limit: Some(limit.unwrap_or(DEFAULT_LANDING_LIMIT)),
                ..TeacherQuery::default()
            },
            false,
        )
        .await
    }

    async fn teacher(&self, id: AccountId) -> Result<Account, AuthError> {
        match self.accounts.get(id).await {
            Ok(account) if account.role == Role::Teacher => Ok(account),
            Ok(_) | Err(AuthError::NotFound(_)) => Err(AuthError::NotFound("Teacher")),
            Err(e) => Err(e),
        }
    }

    /// One teacher with its course count.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NotFound`] if `id` is not a teacher.
    pub async fn details(&self, id: AccountId) -> Result<TeacherCard, AuthError> {
        let account = self.teacher(id).await?;
        let courses = self.course_count(id).await?;
        Ok(TeacherCard::new(account, courses))
    }

    /// Register a teacher account.
    ///
    /// # Errors
    ///
    /// See [`AccountService::create`].
    pub async fn add(&self, mut registration: Registration) -> Result<Account, AuthError> {
        registration.user_type = Some(Role::Teacher.as_str().to_string());
        self.accounts.create(registration).await
    }

    /// Delete a teacher account and its courses.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NotFound`] if `id` is not a teacher.
    pub async fn remove(&self, id: AccountId) -> Result<Account, AuthError> {
        self.teacher(id).await?;
        self.accounts.delete(id).await
    }

    /// Add a course taught by a teacher.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidInput`] for an empty title and
    /// [`AuthError::NotFound`] if `teacher_id` is not a teacher.
    pub async fn add_course(
        &self,
        teacher_id: AccountId,
        title: &str,
        description: Option<String>,
    ) -> Result<Course, AuthError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(AuthError::InvalidInput("Course title is required".to_string()));
        }
        self.teacher(teacher_id).await?;

        let sessions = self.accounts.sessions();
        let course = sessions
            .store_call(
                "create_course",
                sessions.store().create_course(NewCourse {
                    teacher_id,
                    title: title.to_string(),
                    description,
                }),
            )
            .await?;

        tracing::info!(%teacher_id, course_id = course.id, "Course added");
        Ok(course)
    }
}
