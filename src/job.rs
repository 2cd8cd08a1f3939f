//! Run and job descriptions submitted by the scheduler.
//!
//! Project and run names flow into Kubernetes resource names, so validation
//! enforces DNS-1123 label syntax and the derived-name length budgets up
//! front rather than letting the cluster reject a half-provisioned run.

use thiserror::Error;

use crate::naming::{MAX_DNS_LABEL_LENGTH, MAX_PROJECT_NAME_LENGTH, MAX_RUN_NAME_LENGTH};

/// Describes the run a job belongs to.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RunSpec {
    /// Project the run is billed and scoped to.
    pub project_name: String,
    /// Name of the run, unique within the project.
    pub run_name: String,
    /// Public key of the user who submitted the run.
    pub user_public_key: String,
}

impl RunSpec {
    /// Starts a builder for a [`RunSpec`].
    #[must_use]
    pub fn builder() -> RunSpecBuilder {
        RunSpecBuilder::new()
    }

    /// Validates the run description.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::Validation`] when a required field is empty,
    /// [`JobError::InvalidName`] when a name cannot be used as a DNS-1123
    /// label, [`JobError::NameTooLong`] when a name would push a derived
    /// resource name past the cluster's limit, and
    /// [`JobError::LeadingDigit`] when the project name cannot prefix a
    /// service name.
    pub fn validate(&self) -> Result<(), JobError> {
        if self.user_public_key.is_empty() {
            return Err(JobError::Validation("user_public_key".to_owned()));
        }
        validate_label("project_name", &self.project_name, MAX_PROJECT_NAME_LENGTH)?;
        // Service names are DNS-1035 labels and must begin with a letter;
        // the relay service name starts with the project name.
        if self.project_name.starts_with(|c: char| c.is_ascii_digit()) {
            return Err(JobError::LeadingDigit(self.project_name.clone()));
        }
        validate_label("run_name", &self.run_name, MAX_RUN_NAME_LENGTH)
    }
}

/// Builder for [`RunSpec`] that defers trimming and validation to
/// construction.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RunSpecBuilder {
    project_name: String,
    run_name: String,
    user_public_key: String,
}

impl RunSpecBuilder {
    /// Creates an empty builder; fields must be populated before build.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the project name.
    #[must_use]
    pub fn project_name(mut self, value: impl Into<String>) -> Self {
        self.project_name = value.into();
        self
    }

    /// Sets the run name.
    #[must_use]
    pub fn run_name(mut self, value: impl Into<String>) -> Self {
        self.run_name = value.into();
        self
    }

    /// Sets the submitting user's public key.
    #[must_use]
    pub fn user_public_key(mut self, value: impl Into<String>) -> Self {
        self.user_public_key = value.into();
        self
    }

    /// Builds and validates the [`RunSpec`], trimming string inputs.
    ///
    /// # Errors
    ///
    /// Returns a [`JobError`] when a field is empty, not label-safe, or too
    /// long to embed in derived resource names.
    pub fn build(self) -> Result<RunSpec, JobError> {
        let run = RunSpec {
            project_name: self.project_name.trim().to_owned(),
            run_name: self.run_name.trim().to_owned(),
            user_public_key: self.user_public_key.trim().to_owned(),
        };
        run.validate()?;
        Ok(run)
    }
}

/// Describes a single job's container workload.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct JobSpec {
    /// Ordinal of the job within its run.
    pub job_number: u32,
    /// Container image the job runs in. The image must provide an OpenSSH
    /// server for the bootstrap script to start.
    pub image_name: String,
    /// Startup commands executed after the SSH daemon is running. A job with
    /// no commands blocks forever and is driven entirely over SSH.
    pub commands: Vec<String>,
}

impl JobSpec {
    /// Starts a builder for a [`JobSpec`].
    #[must_use]
    pub fn builder() -> JobSpecBuilder {
        JobSpecBuilder::new()
    }

    /// Validates the job description.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::Validation`] when the image name is empty.
    pub fn validate(&self) -> Result<(), JobError> {
        if self.image_name.is_empty() {
            return Err(JobError::Validation("image_name".to_owned()));
        }
        Ok(())
    }
}

/// Builder for [`JobSpec`].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct JobSpecBuilder {
    job_number: u32,
    image_name: String,
    commands: Vec<String>,
}

impl JobSpecBuilder {
    /// Creates an empty builder; the image must be populated before build.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the job ordinal.
    #[must_use]
    pub fn job_number(mut self, value: u32) -> Self {
        self.job_number = value;
        self
    }

    /// Sets the container image.
    #[must_use]
    pub fn image_name(mut self, value: impl Into<String>) -> Self {
        self.image_name = value.into();
        self
    }

    /// Sets the startup commands.
    #[must_use]
    pub fn commands(mut self, value: Vec<String>) -> Self {
        self.commands = value;
        self
    }

    /// Builds and validates the [`JobSpec`], trimming the image name.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::Validation`] when the image name is empty.
    pub fn build(self) -> Result<JobSpec, JobError> {
        let job = JobSpec {
            job_number: self.job_number,
            image_name: self.image_name.trim().to_owned(),
            commands: self.commands,
        };
        job.validate()?;
        Ok(job)
    }
}

/// Errors raised while validating run and job descriptions.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum JobError {
    /// Raised when a required field is missing.
    #[error("missing or empty field: {0}")]
    Validation(String),
    /// Raised when a name cannot be embedded in a Kubernetes resource name.
    #[error("field {field} must be a lowercase DNS-1123 label, got {value:?}")]
    InvalidName {
        /// Field that failed validation.
        field: String,
        /// Offending value.
        value: String,
    },
    /// Raised when a name would push a derived pod, service, or container
    /// name past the cluster's length limit.
    #[error(
        "field {field} must be at most {max} characters so derived resource \
         names fit the DNS label limit, got {len}"
    )]
    NameTooLong {
        /// Field that failed validation.
        field: String,
        /// Longest accepted value for the field.
        max: usize,
        /// Length of the offending value.
        len: usize,
    },
    /// Raised when a project name begins with a digit. Service names derive
    /// from it and DNS-1035 requires them to begin with a letter.
    #[error("field project_name must start with a lowercase letter, got {0:?}")]
    LeadingDigit(String),
}

fn validate_label(field: &str, value: &str, max_len: usize) -> Result<(), JobError> {
    if value.is_empty() {
        return Err(JobError::Validation(field.to_owned()));
    }
    if value.len() > max_len {
        return Err(JobError::NameTooLong {
            field: field.to_owned(),
            max: max_len,
            len: value.len(),
        });
    }
    if is_dns_label(value) {
        Ok(())
    } else {
        Err(JobError::InvalidName {
            field: field.to_owned(),
            value: value.to_owned(),
        })
    }
}

/// Returns whether `value` is a valid DNS-1123 label: lowercase
/// alphanumerics and hyphens, starting and ending alphanumeric, at most 63
/// characters.
fn is_dns_label(value: &str) -> bool {
    if value.is_empty() || value.len() > MAX_DNS_LABEL_LENGTH {
        return false;
    }
    let alnum = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit();
    let valid_chars = value.chars().all(|c| alnum(c) || c == '-');
    let valid_edges = value.starts_with(alnum) && value.ends_with(alnum);
    valid_chars && valid_edges
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn sample_run() -> RunSpecBuilder {
        RunSpec::builder()
            .project_name("p1")
            .run_name("demo")
            .user_public_key("ssh-ed25519 AAAA user@host")
    }

    #[rstest]
    fn builds_a_trimmed_run_spec() {
        let run = RunSpec::builder()
            .project_name("  p1 ")
            .run_name("demo")
            .user_public_key(" ssh-ed25519 AAAA user@host\n")
            .build()
            .expect("run should validate");
        assert_eq!(run.project_name, "p1");
        assert_eq!(run.user_public_key, "ssh-ed25519 AAAA user@host");
    }

    #[rstest]
    #[case("", "missing project name")]
    #[case("Caps", "uppercase")]
    #[case("under_score", "underscore")]
    #[case("-edge", "leading hyphen")]
    #[case("edge-", "trailing hyphen")]
    fn rejects_invalid_project_names(#[case] name: &str, #[case] reason: &str) {
        let err = sample_run()
            .project_name(name)
            .build()
            .expect_err("expected rejection");
        assert!(
            matches!(err, JobError::Validation(_) | JobError::InvalidName { .. }),
            "unexpected error for {reason}: {err}"
        );
    }

    #[rstest]
    fn rejects_a_project_name_that_overflows_derived_names() {
        let value = "p".repeat(MAX_PROJECT_NAME_LENGTH + 1);
        let err = sample_run()
            .project_name(value.as_str())
            .build()
            .expect_err("expected rejection");
        assert_eq!(
            err,
            JobError::NameTooLong {
                field: "project_name".to_owned(),
                max: MAX_PROJECT_NAME_LENGTH,
                len: value.len(),
            }
        );
    }

    #[rstest]
    fn rejects_a_run_name_that_overflows_derived_names() {
        let value = "r".repeat(MAX_RUN_NAME_LENGTH + 1);
        let err = sample_run()
            .run_name(value.as_str())
            .build()
            .expect_err("expected rejection");
        assert_eq!(
            err,
            JobError::NameTooLong {
                field: "run_name".to_owned(),
                max: MAX_RUN_NAME_LENGTH,
                len: value.len(),
            }
        );
    }

    #[rstest]
    fn accepts_names_at_the_derived_length_budget() {
        let run = sample_run()
            .project_name("p".repeat(MAX_PROJECT_NAME_LENGTH))
            .run_name("r".repeat(MAX_RUN_NAME_LENGTH))
            .build()
            .expect("names at the budget should validate");
        assert_eq!(run.project_name.len(), MAX_PROJECT_NAME_LENGTH);
        assert_eq!(run.run_name.len(), MAX_RUN_NAME_LENGTH);
    }

    #[rstest]
    fn rejects_a_project_name_starting_with_a_digit() {
        let err = sample_run()
            .project_name("9lives")
            .build()
            .expect_err("expected rejection");
        assert_eq!(err, JobError::LeadingDigit("9lives".to_owned()));
    }

    #[rstest]
    fn accepts_a_run_name_starting_with_a_digit() {
        // Job pod names carry a "job-" prefix, so the derived service name
        // still begins with a letter.
        sample_run()
            .run_name("2024-retrain")
            .build()
            .expect("run should validate");
    }

    #[rstest]
    fn rejects_missing_user_key() {
        let err = sample_run()
            .user_public_key("  ")
            .build()
            .expect_err("expected rejection");
        assert_eq!(err, JobError::Validation("user_public_key".to_owned()));
    }

    #[rstest]
    fn job_spec_requires_an_image() {
        let err = JobSpec::builder().build().expect_err("expected rejection");
        assert_eq!(err, JobError::Validation("image_name".to_owned()));
    }

    #[rstest]
    fn job_spec_keeps_commands_in_order() {
        let job = JobSpec::builder()
            .image_name("debian:bookworm")
            .commands(vec!["first".to_owned(), "second".to_owned()])
            .build()
            .expect("job should validate");
        assert_eq!(job.commands, vec!["first", "second"]);
    }

    #[rstest]
    #[case("demo", true)]
    #[case("run-42", true)]
    #[case("a", true)]
    #[case("", false)]
    #[case("Demo", false)]
    #[case("run.42", false)]
    fn dns_label_rules(#[case] value: &str, #[case] accepted: bool) {
        assert_eq!(is_dns_label(value), accepted);
    }
}
