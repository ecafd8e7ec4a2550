//! Transit entities.
//!
//! An [`Entity`] is one of four kinds (feed, operator, route, stop) sharing a
//! name, geometry, tags and a set of origin identifiers. Relationships
//! between entities live in [`crate::graph::EntityGraph`]; the identifier sets
//! kept in [`Relations`] only carry relationships read back from JSON whose
//! counterpart entities were not loaded.

use geo::Coord;
use onestop_core::error::{OnestopError, Result};
use onestop_core::models::{compose, mangle, mangle_stop, Geometry, OnestopType};
use onestop_geo::models::GeometryExt;
use onestop_geo::Located;
use std::collections::{BTreeMap, BTreeSet};

/// Default format of a feed without an explicit `feedFormat`
pub const DEFAULT_FEED_FORMAT: &str = "gtfs";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedInfo {
    pub url: Option<String>,
    pub sha1: Option<String>,
    pub feed_format: Option<String>,
}

impl FeedInfo {
    pub fn feed_format(&self) -> &str {
        self.feed_format.as_deref().unwrap_or(DEFAULT_FEED_FORMAT)
    }
}

/// Closed set of entity kinds; only feeds carry extra fields
#[derive(Debug, Clone, PartialEq)]
pub enum EntityKind {
    Feed(FeedInfo),
    Operator,
    Route,
    Stop,
}

impl EntityKind {
    pub fn onestop_type(&self) -> OnestopType {
        match self {
            EntityKind::Feed(_) => OnestopType::Feed,
            EntityKind::Operator => OnestopType::Operator,
            EntityKind::Route => OnestopType::Route,
            EntityKind::Stop => OnestopType::Stop,
        }
    }
}

/// Relationship identifiers stored on the entity itself
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Relations {
    pub serves: BTreeSet<String>,
    pub served_by: BTreeSet<String>,
    pub operated_by: BTreeSet<String>,
    /// Operator Onestop ID to GTFS agency id
    pub operators_in_feed: BTreeMap<String, String>,
}

impl Relations {
    fn merge(&mut self, other: &Relations) {
        self.serves.extend(other.serves.iter().cloned());
        self.served_by.extend(other.served_by.iter().cloned());
        self.operated_by.extend(other.operated_by.iter().cloned());
        self.operators_in_feed
            .extend(other.operators_in_feed.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    kind: EntityKind,
    pub name: Option<String>,
    pub geometry: Option<Geometry>,
    pub tags: BTreeMap<String, String>,
    identifiers: BTreeSet<String>,
    onestop_id: Option<String>,
    geohash: Option<String>,
    pub relations: Relations,
}

impl Entity {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            name: None,
            geometry: None,
            tags: BTreeMap::new(),
            identifiers: BTreeSet::new(),
            onestop_id: None,
            geohash: None,
            relations: Relations::default(),
        }
    }

    pub fn feed(info: FeedInfo) -> Self {
        Self::new(EntityKind::Feed(info))
    }

    pub fn operator() -> Self {
        Self::new(EntityKind::Operator)
    }

    pub fn route() -> Self {
        Self::new(EntityKind::Route)
    }

    pub fn stop() -> Self {
        Self::new(EntityKind::Stop)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_geometry(mut self, geometry: Geometry) -> Self {
        self.geometry = Some(geometry);
        self
    }

    pub fn with_onestop_id(mut self, onestop_id: impl Into<String>) -> Self {
        self.onestop_id = Some(onestop_id.into());
        self
    }

    pub fn with_geohash(mut self, geohash: impl Into<String>) -> Self {
        self.geohash = Some(geohash.into());
        self
    }

    pub fn kind(&self) -> &EntityKind {
        &self.kind
    }

    pub fn onestop_type(&self) -> OnestopType {
        self.kind.onestop_type()
    }

    pub fn is(&self, onestop_type: OnestopType) -> bool {
        self.onestop_type() == onestop_type
    }

    pub fn feed_info(&self) -> Option<&FeedInfo> {
        match &self.kind {
            EntityKind::Feed(info) => Some(info),
            _ => None,
        }
    }

    pub fn feed_info_mut(&mut self) -> Option<&mut FeedInfo> {
        match &mut self.kind {
            EntityKind::Feed(info) => Some(info),
            _ => None,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn identifiers(&self) -> &BTreeSet<String> {
        &self.identifiers
    }

    /// Add an origin identifier; fails if it is already present
    pub fn add_identifier(&mut self, identifier: impl Into<String>) -> Result<()> {
        let identifier = identifier.into();
        if self.identifiers.contains(&identifier) {
            return Err(OnestopError::ExistingIdentifier { identifier });
        }
        self.identifiers.insert(identifier);
        Ok(())
    }

    pub fn set_tag(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.tags.insert(key.into(), value.into());
    }

    pub fn add_tags(&mut self, tags: impl IntoIterator<Item = (String, String)>) {
        self.tags.extend(tags);
    }

    /// Identifier supplied from outside or committed earlier
    pub fn cached_onestop(&self) -> Option<&str> {
        self.onestop_id.as_deref()
    }

    pub fn set_onestop(&mut self, onestop_id: impl Into<String>) {
        self.onestop_id = Some(onestop_id.into());
    }

    pub fn clear_onestop(&mut self) {
        self.onestop_id = None;
    }

    /// Geohash supplied from outside, overriding the computed one
    pub fn cached_geohash(&self) -> Option<&str> {
        self.geohash.as_deref()
    }

    pub fn set_geohash(&mut self, geohash: impl Into<String>) {
        self.geohash = Some(geohash.into());
    }

    /// Name component of the identifier
    pub fn mangled_name(&self) -> Result<String> {
        let name = self.name().ok_or_else(|| OnestopError::MissingName {
            kind: self.onestop_type().to_string(),
        })?;
        Ok(match self.kind {
            EntityKind::Stop => mangle_stop(name),
            _ => mangle(name),
        })
    }

    /// Compose this entity's identifier around the given geohash
    pub fn make_onestop(&self, geohash: &str) -> Result<String> {
        Ok(compose(self.onestop_type(), geohash, &self.mangled_name()?))
    }

    /// Location of a stop
    pub fn point(&self) -> Result<Coord<f64>> {
        if !self.is(OnestopType::Stop) {
            return Err(self.unsupported("point"));
        }
        self.geometry.as_ref().and_then(|g| g.point_coord()).ok_or_else(|| {
            OnestopError::MissingGeometry { name: self.name().unwrap_or_default().to_string() }
        })
    }

    /// Degenerate bounding box `[x, y, x, y]` of a stop
    pub fn bbox(&self) -> Result<[f64; 4]> {
        if !self.is(OnestopType::Stop) {
            return Err(self.unsupported("bbox"));
        }
        let c = self.point()?;
        Ok([c.x, c.y, c.x, c.y])
    }

    fn unsupported(&self, operation: &str) -> OnestopError {
        OnestopError::UnsupportedOperation {
            operation: operation.to_string(),
            kind: self.onestop_type().to_string(),
        }
    }

    /// Fold `other` into this entity.
    ///
    /// Identifiers are unioned; an identifier already present is skipped when
    /// `ignore_existing` is set and rejected otherwise, in which case nothing
    /// is modified. Name and geometry are replaced when `other` has them,
    /// tags from `other` win, and relationship sets are unioned.
    pub fn merge(&mut self, other: &Entity, ignore_existing: bool) -> Result<()> {
        if !ignore_existing {
            if let Some(existing) = other.identifiers.intersection(&self.identifiers).next() {
                return Err(OnestopError::ExistingIdentifier { identifier: existing.clone() });
            }
        }
        self.identifiers.extend(other.identifiers.iter().cloned());

        if let Some(name) = &other.name {
            self.name = Some(name.clone());
        }
        if let Some(geometry) = &other.geometry {
            self.geometry = Some(geometry.clone());
        }
        self.tags.extend(other.tags.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.relations.merge(&other.relations);

        if let (EntityKind::Feed(mine), EntityKind::Feed(theirs)) = (&mut self.kind, &other.kind) {
            if theirs.url.is_some() {
                mine.url = theirs.url.clone();
            }
            if theirs.sha1.is_some() {
                mine.sha1 = theirs.sha1.clone();
            }
            if theirs.feed_format.is_some() {
                mine.feed_format = theirs.feed_format.clone();
            }
        }
        Ok(())
    }
}

impl Located for Entity {
    fn location(&self) -> Option<Coord<f64>> {
        self.point().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bullfrog() -> Entity {
        Entity::stop().with_name("Bullfrog (Demo)").with_geometry(Geometry::point(-116.81797, 36.88108))
    }

    #[test]
    fn test_add_identifier() {
        let mut stop = bullfrog();
        stop.add_identifier("gtfs://f-9qs-dta/s/BULLFROG").unwrap();

        let err = stop.add_identifier("gtfs://f-9qs-dta/s/BULLFROG").unwrap_err();
        assert!(matches!(err, OnestopError::ExistingIdentifier { .. }));
        assert_eq!(stop.identifiers().len(), 1);
    }

    #[test]
    fn test_merge_disjoint_identifiers() {
        let mut a = bullfrog();
        a.add_identifier("gtfs://a/s/1").unwrap();
        a.add_identifier("gtfs://a/s/2").unwrap();
        let mut b = Entity::stop();
        b.add_identifier("gtfs://b/s/1").unwrap();

        a.merge(&b, true).unwrap();
        assert_eq!(a.identifiers().len(), 3);
        // Name and geometry kept when the other side has none
        assert_eq!(a.name(), Some("Bullfrog (Demo)"));
        assert!(a.geometry.is_some());
    }

    #[test]
    fn test_merge_overlapping_identifiers() {
        let mut a = bullfrog();
        a.add_identifier("gtfs://a/s/1").unwrap();
        let mut b = Entity::stop().with_name("Bullfrog");
        b.add_identifier("gtfs://a/s/1").unwrap();
        b.add_identifier("gtfs://a/s/9").unwrap();

        a.merge(&b, true).unwrap();
        assert_eq!(a.identifiers().len(), 2);
        assert_eq!(a.name(), Some("Bullfrog"));
    }

    #[test]
    fn test_strict_merge_leaves_target_untouched() {
        let mut a = bullfrog();
        a.add_identifier("gtfs://a/s/1").unwrap();
        let mut b = Entity::stop().with_name("Renamed");
        b.add_identifier("gtfs://a/s/1").unwrap();
        b.set_tag("zone_id", "3");

        let err = a.merge(&b, false).unwrap_err();
        assert!(matches!(err, OnestopError::ExistingIdentifier { ref identifier } if identifier == "gtfs://a/s/1"));
        assert_eq!(a.name(), Some("Bullfrog (Demo)"));
        assert!(a.tags.is_empty());
    }

    #[test]
    fn test_merge_tags_and_relations() {
        let mut a = Entity::route().with_name("10");
        a.set_tag("route_color", "red");
        a.set_tag("route_url", "http://a");
        a.relations.serves.insert("s-b-two".to_string());
        let mut b = Entity::route();
        b.set_tag("route_color", "blue");
        b.relations.serves.insert("s-a-one".to_string());

        a.merge(&b, true).unwrap();
        assert_eq!(a.tags["route_color"], "blue");
        assert_eq!(a.tags["route_url"], "http://a");
        let serves: Vec<&str> = a.relations.serves.iter().map(String::as_str).collect();
        assert_eq!(serves, vec!["s-a-one", "s-b-two"]);
    }

    #[test]
    fn test_merge_feed_fields() {
        let mut a = Entity::feed(FeedInfo { url: Some("http://old".into()), ..Default::default() });
        let b = Entity::feed(FeedInfo { sha1: Some("abc".into()), ..Default::default() });
        a.merge(&b, true).unwrap();

        let info = a.feed_info().unwrap();
        assert_eq!(info.url.as_deref(), Some("http://old"));
        assert_eq!(info.sha1.as_deref(), Some("abc"));
        assert_eq!(info.feed_format(), "gtfs");
    }

    #[test]
    fn test_point_and_bbox() {
        let stop = bullfrog();
        let point = stop.point().unwrap();
        assert_eq!((point.x, point.y), (-116.81797, 36.88108));
        assert_eq!(stop.bbox().unwrap(), [-116.81797, 36.88108, -116.81797, 36.88108]);

        let route = Entity::route().with_name("10");
        assert!(matches!(route.point(), Err(OnestopError::UnsupportedOperation { .. })));
        assert!(matches!(route.bbox(), Err(OnestopError::UnsupportedOperation { .. })));

        let unplaced = Entity::stop().with_name("Nowhere");
        assert!(matches!(unplaced.point(), Err(OnestopError::MissingGeometry { .. })));
    }

    #[test]
    fn test_make_onestop() {
        let stop = bullfrog();
        assert_eq!(stop.make_onestop("9qscv9zzb585").unwrap(), "s-9qscv9zzb5-bullfrogdemo");

        let unnamed = Entity::operator();
        assert!(matches!(unnamed.make_onestop("9qs"), Err(OnestopError::MissingName { .. })));
    }

    #[test]
    fn test_stop_names_drop_street_words() {
        let stop = Entity::stop().with_name("E Main St / S Irving St (Demo)");
        let route = Entity::route().with_name("Main St");
        assert_eq!(stop.mangled_name().unwrap(), "emain~sirvingdemo");
        assert_eq!(route.mangled_name().unwrap(), "mainst");
    }
}
