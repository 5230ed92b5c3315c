// 📚 Catalog + Directory - external collaborators
//
// The engine never owns course or student identity. It asks these traits and
// treats "absent" as NotFound for the calling operation.
//
// CourseRegistry / StudentRegistry are the in-process implementations used by
// the CLI, the server, and tests. Both can be seeded from CSV.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, RwLock};

// ============================================================================
// COURSE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    /// Stable catalog identity
    pub id: String,

    /// Display code, e.g. "CS101"
    pub code: String,

    pub title: String,

    /// Credit count used for GPA weighting
    pub credits: u32,

    /// Prerequisite course ids, in catalog-declared order
    pub prerequisites: Vec<String>,
}

impl Course {
    pub fn new(id: &str, code: &str, title: &str, credits: u32) -> Self {
        Course {
            id: id.to_string(),
            code: code.to_string(),
            title: title.to_string(),
            credits,
            prerequisites: Vec::new(),
        }
    }

    /// Builder-style helper for declaring a prerequisite
    pub fn requires(mut self, course_id: &str) -> Self {
        if !self.prerequisites.iter().any(|p| p == course_id) {
            self.prerequisites.push(course_id.to_string());
        }
        self
    }
}

// ============================================================================
// COLLABORATOR TRAITS
// ============================================================================

pub trait CourseCatalog: Send + Sync {
    fn course(&self, course_id: &str) -> Option<Course>;
}

pub trait StudentDirectory: Send + Sync {
    fn exists(&self, student_id: &str) -> bool;
}

// ============================================================================
// COURSE REGISTRY
// ============================================================================

/// CSV shape: `id,code,title,credits,prerequisites` (prerequisites `;`-separated)
#[derive(Debug, Deserialize)]
struct CourseRow {
    id: String,
    code: String,
    title: String,
    credits: u32,
    #[serde(default)]
    prerequisites: String,
}

impl From<CourseRow> for Course {
    fn from(row: CourseRow) -> Self {
        Course {
            id: row.id,
            code: row.code,
            title: row.title,
            credits: row.credits,
            prerequisites: row
                .prerequisites
                .split(';')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }
}

#[derive(Clone, Default)]
pub struct CourseRegistry {
    courses: Arc<RwLock<HashMap<String, Course>>>,
}

impl CourseRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_courses(courses: impl IntoIterator<Item = Course>) -> Self {
        let registry = Self::new();
        for course in courses {
            registry.register(course);
        }
        registry
    }

    pub fn load_csv(csv_path: &Path) -> Result<Self> {
        let rdr = csv::Reader::from_path(csv_path)
            .with_context(|| format!("Failed to open course catalog: {:?}", csv_path))?;
        Self::from_csv_reader(rdr)
    }

    pub fn from_csv_reader<R: std::io::Read>(mut rdr: csv::Reader<R>) -> Result<Self> {
        let registry = Self::new();
        for result in rdr.deserialize() {
            let row: CourseRow = result.context("Failed to deserialize course row")?;
            registry.register(row.into());
        }
        tracing::info!(courses = registry.count(), "course catalog loaded");
        Ok(registry)
    }

    /// Insert or replace a course by id
    pub fn register(&self, course: Course) {
        let mut courses = self.courses.write().unwrap_or_else(|e| e.into_inner());
        courses.insert(course.id.clone(), course);
    }

    pub fn count(&self) -> usize {
        self.courses.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl CourseCatalog for CourseRegistry {
    fn course(&self, course_id: &str) -> Option<Course> {
        let courses = self.courses.read().unwrap_or_else(|e| e.into_inner());
        courses.get(course_id).cloned()
    }
}

// ============================================================================
// STUDENT REGISTRY
// ============================================================================

/// CSV shape: `id,name`; only the id matters for existence checks
#[derive(Debug, Deserialize)]
struct StudentRow {
    id: String,
}

#[derive(Clone, Default)]
pub struct StudentRegistry {
    students: Arc<RwLock<HashSet<String>>>,
}

impl StudentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_ids<'a>(ids: impl IntoIterator<Item = &'a str>) -> Self {
        let registry = Self::new();
        for id in ids {
            registry.register(id);
        }
        registry
    }

    pub fn load_csv(csv_path: &Path) -> Result<Self> {
        let rdr = csv::Reader::from_path(csv_path)
            .with_context(|| format!("Failed to open student directory: {:?}", csv_path))?;
        Self::from_csv_reader(rdr)
    }

    pub fn from_csv_reader<R: std::io::Read>(mut rdr: csv::Reader<R>) -> Result<Self> {
        let registry = Self::new();
        for result in rdr.deserialize() {
            let row: StudentRow = result.context("Failed to deserialize student row")?;
            registry.register(&row.id);
        }
        tracing::info!(students = registry.count(), "student directory loaded");
        Ok(registry)
    }

    pub fn register(&self, id: &str) {
        let mut students = self.students.write().unwrap_or_else(|e| e.into_inner());
        students.insert(id.to_string());
    }

    pub fn count(&self) -> usize {
        self.students.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl StudentDirectory for StudentRegistry {
    fn exists(&self, student_id: &str) -> bool {
        let students = self.students.read().unwrap_or_else(|e| e.into_inner());
        students.contains(student_id)
    }
}
