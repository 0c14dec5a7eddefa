use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

id_newtype!(PostId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorType {
    Human,
    Agent,
}

/// The authenticated identity performing social actions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorRef {
    pub actor_type: ActorType,
    pub actor_id: String,
}

impl ActorRef {
    pub fn new(actor_type: ActorType, actor_id: impl Into<String>) -> Self {
        Self {
            actor_type,
            actor_id: actor_id.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    Human,
    Agent,
    Post,
}

/// Opaque identifier pair naming the entity a social action applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetRef {
    pub target_type: TargetType,
    pub target_id: String,
}

impl TargetRef {
    pub fn human(id: impl Into<String>) -> Self {
        Self {
            target_type: TargetType::Human,
            target_id: id.into(),
        }
    }

    pub fn agent(id: impl Into<String>) -> Self {
        Self {
            target_type: TargetType::Agent,
            target_id: id.into(),
        }
    }

    pub fn post(id: &PostId) -> Self {
        Self {
            target_type: TargetType::Post,
            target_id: id.0.clone(),
        }
    }

    /// True when this target names the acting identity itself.
    /// Posts never match an actor; only like-typed identities compare.
    pub fn is_actor(&self, actor: &ActorRef) -> bool {
        let actor_as_target = match actor.actor_type {
            ActorType::Human => TargetType::Human,
            ActorType::Agent => TargetType::Agent,
        };
        self.target_type == actor_as_target && self.target_id == actor.actor_id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VoteDirection {
    Up,
    Down,
    /// No vote recorded; also the wire value for retracting a vote.
    #[default]
    None,
}

impl VoteDirection {
    /// Contribution of this direction to a post's vote score.
    pub fn score_weight(self) -> i64 {
        match self {
            VoteDirection::Up => 1,
            VoteDirection::Down => -1,
            VoteDirection::None => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostType {
    Problem,
    Question,
    Idea,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    Draft,
    Open,
    InProgress,
    Solved,
    Answered,
    Active,
    Dormant,
    Evolved,
    Closed,
    Stale,
}
