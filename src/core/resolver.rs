//! Target resolution: which model (and which row) a chained call operates on.

use crate::core::{Model, Record, Relation};
use crate::errors::{Error, Result};

/// A model type, or one of its materialized rows.
#[derive(Debug, Clone)]
pub enum Subject {
    Type(&'static dyn Model),
    Instance(Record),
}

impl Subject {
    #[must_use]
    pub fn model(&self) -> &'static dyn Model {
        match self {
            Self::Type(model) => *model,
            Self::Instance(record) => record.model(),
        }
    }

    #[must_use]
    pub fn record(&self) -> Option<&Record> {
        match self {
            Self::Type(_) => None,
            Self::Instance(record) => Some(record),
        }
    }
}

impl<M: Model + 'static> From<&'static M> for Subject {
    fn from(model: &'static M) -> Self {
        Self::Type(model)
    }
}

impl From<Record> for Subject {
    fn from(record: Record) -> Self {
        Self::Instance(record)
    }
}

/// Where the subject of a call comes from.
#[derive(Debug, Clone, Default)]
pub enum Target {
    /// Set by the caller.
    Explicit(Subject),
    /// The model hosting the chain, if any.
    #[default]
    SelfReferential,
}

/// A resolved subject, narrowed to a relationship when one was named.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub subject: Subject,
    pub relation: Option<Relation>,
}

impl Resolved {
    /// The model whose table the query reads from.
    #[must_use]
    pub fn model(&self) -> &'static dyn Model {
        self.relation
            .as_ref()
            .map_or_else(|| self.subject.model(), |relation| relation.related)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ModelResolver {
    target: Target,
    host: Option<&'static dyn Model>,
    relationship: Option<String>,
}

impl ModelResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolver for a chain hosted by `model`, used when no explicit target is set.
    #[must_use]
    pub fn hosted_by(model: &'static dyn Model) -> Self {
        Self {
            host: Some(model),
            ..Self::default()
        }
    }

    pub fn set_target(&mut self, subject: Subject) {
        self.target = Target::Explicit(subject);
    }

    pub fn set_relationship(&mut self, relationship: Option<String>) {
        self.relationship = relationship;
    }

    #[must_use]
    pub fn target(&self) -> &Target {
        &self.target
    }

    #[must_use]
    pub fn relationship(&self) -> Option<&str> {
        self.relationship.as_deref()
    }

    /// Explicit target first, then the hosting model.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnresolvedTarget`] when neither is available.
    pub fn resolve(&self) -> Result<Subject> {
        let subject = match (&self.target, self.host) {
            (Target::Explicit(subject), _) => subject.clone(),
            (Target::SelfReferential, Some(host)) => Subject::Type(host),
            (Target::SelfReferential, None) => return Err(Error::UnresolvedTarget),
        };
        tracing::debug!(model = subject.model().name(), "Resolved target");
        Ok(subject)
    }

    /// The related model when a relationship is named, otherwise the subject's own model.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownRelationship`] when the relationship is not declared.
    pub fn resolve_related(&self, subject: &Subject) -> Result<&'static dyn Model> {
        match &self.relationship {
            Some(name) => Ok(subject.model().require_relation(name)?.related),
            None => Ok(subject.model()),
        }
    }

    /// Resolve the subject and, if a relationship is named, check that it hangs
    /// off an identified record.
    ///
    /// # Errors
    ///
    /// [`Error::UnresolvedTarget`], [`Error::UnknownRelationship`], or
    /// [`Error::InvalidModel`] when a relationship is requested on a bare type or an
    /// unsaved record.
    pub fn resolve_scoped(&self) -> Result<Resolved> {
        let subject = self.resolve()?;
        let Some(name) = &self.relationship else {
            return Ok(Resolved {
                subject,
                relation: None,
            });
        };

        if !subject.record().is_some_and(Record::is_identified) {
            return Err(Error::InvalidModel(
                "cannot operate on a relationship of an unidentified record".to_string(),
            ));
        }
        let relation = subject.model().require_relation(name)?;
        tracing::debug!(
            model = subject.model().name(),
            relationship = relation.name,
            related = relation.related.name(),
            "Narrowed target to relationship"
        );
        Ok(Resolved {
            subject,
            relation: Some(relation),
        })
    }
}
