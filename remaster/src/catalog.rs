//! Job definitions for the legacy music catalog.
//!
//! Each entity's migration is data: a descriptor combining the declarative
//! rule set with the special steps that entity needs (aggregates, fan-out,
//! search projection). Selection predicates are invocation data, so every
//! constructor takes the predicate of its bounded reload.

use crate::destination::IndexSpec;
use crate::jobs::JobSpec;
use crate::search::{IndexSchema, Projection, ProjectionField};
use crate::source::IdPredicate;
use crate::transform::{AggregateRule, Coercion, FanOutRule, RuleSet};

/// Search index receiving song projections.
pub const SONG_INDEX: &str = "songs";

/// Selection predicates for a full catalog reload, one per entity.
#[derive(Debug, Clone)]
pub struct CatalogPredicates {
    pub artists: IdPredicate,
    pub blogposts: IdPredicate,
    pub countries: IdPredicate,
    pub users: IdPredicate,
    pub comments: IdPredicate,
    pub songs: IdPredicate,
    pub songimages: IdPredicate,
    pub songlyrics: IdPredicate,
}

impl Default for CatalogPredicates {
    /// Selects everything, the full-reload default.
    fn default() -> Self {
        Self {
            artists: IdPredicate::All,
            blogposts: IdPredicate::All,
            countries: IdPredicate::All,
            users: IdPredicate::All,
            comments: IdPredicate::All,
            songs: IdPredicate::All,
            songimages: IdPredicate::All,
            songlyrics: IdPredicate::All,
        }
    }
}

/// Builds the descriptors of a full catalog reload.
pub fn jobs(predicates: CatalogPredicates) -> Vec<JobSpec> {
    vec![
        artists(predicates.artists),
        blogposts(predicates.blogposts),
        countries(predicates.countries),
        users(predicates.users),
        comments(predicates.comments),
        songs(predicates.songs),
        songimages(predicates.songimages),
        songlyrics(predicates.songlyrics),
    ]
}

pub fn artists(predicate: IdPredicate) -> JobSpec {
    JobSpec::new("artists", "artists", "artists")
        .with_predicate(predicate)
        .with_rules(
            RuleSet::new()
                .allow_passthrough()
                .required("_id", Coercion::CanonicalId),
        )
        .with_aggregate(AggregateRule::comment_count("artists", "comments"))
}

pub fn blogposts(predicate: IdPredicate) -> JobSpec {
    JobSpec::new("blogposts", "blogposts", "blogposts")
        .with_predicate(predicate)
        .with_rules(
            RuleSet::new()
                .allow_passthrough()
                .required("_id", Coercion::CanonicalId),
        )
}

pub fn countries(predicate: IdPredicate) -> JobSpec {
    // Countries are copied as-is; they keep their native identifiers.
    JobSpec::new("countries", "countries", "countries")
        .with_predicate(predicate)
        .with_rules(RuleSet::new().allow_passthrough())
}

pub fn users(predicate: IdPredicate) -> JobSpec {
    JobSpec::new("users", "users", "users")
        .with_predicate(predicate)
        .with_rules(
            RuleSet::new()
                .allow_passthrough()
                .required("_id", Coercion::CanonicalId)
                .drop_field("recentlyPlayed"),
        )
}

pub fn comments(predicate: IdPredicate) -> JobSpec {
    JobSpec::new("comments", "comments", "comments")
        .with_predicate(predicate)
        .with_rules(
            RuleSet::new()
                .allow_passthrough()
                .required("_id", Coercion::CanonicalId)
                .nested(
                    "reference",
                    RuleSet::new()
                        .required("collection", Coercion::None)
                        .required("id", Coercion::CanonicalId),
                )
                .optional("parent", Coercion::CanonicalId)
                .optional("children", Coercion::CanonicalIdList)
                .required("user", Coercion::CanonicalId)
                .drop_field("likers"),
        )
        .with_index(IndexSpec::non_unique(
            "by_reference",
            ["reference.collection", "reference.id"],
        ))
        .with_fan_out(FanOutRule {
            field: "likers".to_owned(),
            companion: "usercomments".to_owned(),
            count_field: "likeCount".to_owned(),
            element_key: "user".to_owned(),
            parent_key: "comment".to_owned(),
            flag_field: "like".to_owned(),
            indexes: vec![IndexSpec::unique(
                "user_comment",
                ["_id.user", "_id.comment"],
            )],
        })
}

pub fn songs(predicate: IdPredicate) -> JobSpec {
    JobSpec::new("songs", "songs", "songs")
        .with_predicate(predicate)
        .with_rules(
            RuleSet::new()
                .allow_passthrough()
                .required("_id", Coercion::CanonicalId)
                .required("artist", Coercion::CanonicalId)
                .required_as("uploader", "user", Coercion::CanonicalId)
                .optional_as("tags", "hashtags", Coercion::None)
                .optional_as("images", "imagesList", Coercion::CanonicalIdList)
                .optional("lyrics", Coercion::Text)
                .drop_field("videos")
                .drop_field("videosCount"),
        )
        .with_index(IndexSpec::non_unique("by_artist", ["artist"]))
        .with_index(IndexSpec::non_unique("by_user", ["user"]))
        .with_aggregate(AggregateRule::comment_count("songs", "comments"))
        .with_projection(song_projection())
        .depends_on("artists")
        .depends_on("users")
}

pub fn songimages(predicate: IdPredicate) -> JobSpec {
    JobSpec::new("songimages", "songimages", "songimages")
        .with_predicate(predicate)
        .with_rules(
            RuleSet::new()
                .allow_passthrough()
                .required("_id", Coercion::CanonicalId)
                .required("song", Coercion::CanonicalId)
                .required("addedBy", Coercion::CanonicalId)
                .optional("likers", Coercion::CanonicalIdList)
                .optional("dislikers", Coercion::CanonicalIdList),
        )
        .with_index(IndexSpec::non_unique("by_song", ["song"]))
}

pub fn songlyrics(predicate: IdPredicate) -> JobSpec {
    JobSpec::new("songlyrics", "songlyrics", "songlyrics")
        .with_predicate(predicate)
        .with_rules(
            RuleSet::new()
                .allow_passthrough()
                .required("_id", Coercion::CanonicalId)
                .required("song", Coercion::CanonicalId)
                .required("addedBy", Coercion::CanonicalId),
        )
        .with_index(IndexSpec::non_unique("by_song", ["song"]))
}

/// The denormalized song view written to the search index.
///
/// Title and lyrics get the language analyzer; artist and uploader names are
/// exact values; image references and the formatted duration are stored but
/// not analyzed.
pub fn song_projection() -> Projection {
    Projection {
        index: SONG_INDEX.to_owned(),
        schema: IndexSchema::new()
            .keyword("_id")
            .text("title", "english")
            .keyword("artist")
            .keyword("user")
            .text("lyrics", "english")
            .keyword("hashtags")
            .stored_only("imagesList")
            .stored_only("duration"),
        fields: vec![
            ProjectionField::JoinedTitle {
                title_field: "title".to_owned(),
                related_field: "artist".to_owned(),
                collection: "artists".to_owned(),
                name_field: "name".to_owned(),
                target: "title".to_owned(),
            },
            ProjectionField::RelatedName {
                field: "artist".to_owned(),
                collection: "artists".to_owned(),
                name_field: "name".to_owned(),
                target: "artist".to_owned(),
            },
            ProjectionField::RelatedName {
                field: "user".to_owned(),
                collection: "users".to_owned(),
                name_field: "name".to_owned(),
                target: "user".to_owned(),
            },
            ProjectionField::Duration {
                field: "duration".to_owned(),
                target: "duration".to_owned(),
            },
            ProjectionField::SanitizedText {
                field: "lyrics".to_owned(),
                target: "lyrics".to_owned(),
            },
            ProjectionField::Copy {
                field: "hashtags".to_owned(),
                target: "hashtags".to_owned(),
            },
            ProjectionField::Copy {
                field: "imagesList".to_owned(),
                target: "imagesList".to_owned(),
            },
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn the_catalog_covers_every_entity_once() {
        let jobs = jobs(CatalogPredicates::default());
        let entities: HashSet<&str> = jobs.iter().map(|job| job.entity.as_str()).collect();

        assert_eq!(jobs.len(), 8);
        assert_eq!(entities.len(), 8);
    }

    #[test]
    fn songs_wait_for_the_entities_they_join_against() {
        let songs = songs(IdPredicate::All);
        assert_eq!(songs.depends_on, vec!["artists", "users"]);
        assert!(songs.projection.is_some());
    }

    #[test]
    fn comments_fan_likers_out_into_usercomments() {
        let comments = comments(IdPredicate::All);
        let fan_out = comments.fan_out.as_ref().unwrap();

        assert_eq!(fan_out.companion, "usercomments");
        assert_eq!(fan_out.count_field, "likeCount");
        assert!(fan_out.indexes.iter().any(|index| index.unique));
    }
}
