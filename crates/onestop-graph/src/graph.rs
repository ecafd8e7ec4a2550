//! Entity graph.
//!
//! Entities are stored in an arena and addressed by [`EntityId`]. Parent and
//! child edges are index sets kept on both ends, so a feed reaches its stops
//! by walking down and a stop reaches its operators by walking up.

use crate::entity::Entity;
use onestop_core::error::{OnestopError, Result};
use onestop_core::models::OnestopType;
use onestop_geo::geohash::{self, MAX_LENGTH};
use onestop_geo::geohash_features;
use std::collections::{BTreeMap, BTreeSet};

/// GTFS agency id tag carried by operators
pub const AGENCY_ID_TAG: &str = "agency_id";

/// Index of an entity in an [`EntityGraph`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId(usize);

impl EntityId {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Default)]
pub struct EntityGraph {
    entities: Vec<Entity>,
    parents: Vec<BTreeSet<EntityId>>,
    children: Vec<BTreeSet<EntityId>>,
}

impl EntityGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, entity: Entity) -> EntityId {
        let id = EntityId(self.entities.len());
        self.entities.push(entity);
        self.parents.push(BTreeSet::new());
        self.children.push(BTreeSet::new());
        id
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn entity(&self, id: EntityId) -> &Entity {
        &self.entities[id.0]
    }

    pub fn entity_mut(&mut self, id: EntityId) -> &mut Entity {
        &mut self.entities[id.0]
    }

    pub fn ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        (0..self.entities.len()).map(EntityId)
    }

    /// All entities of one kind in insertion order
    pub fn of_type(&self, onestop_type: OnestopType) -> Vec<EntityId> {
        self.ids().filter(|id| self.entity(*id).is(onestop_type)).collect()
    }

    // Linking

    /// Create a parent-child relationship; both sides are updated
    pub fn pclink(&mut self, parent: EntityId, child: EntityId) {
        self.children[parent.0].insert(child);
        self.parents[child.0].insert(parent);
    }

    pub fn add_child(&mut self, entity: EntityId, child: EntityId) {
        self.pclink(entity, child);
    }

    pub fn add_parent(&mut self, entity: EntityId, parent: EntityId) {
        self.pclink(parent, entity);
    }

    pub fn parents(&self, id: EntityId) -> &BTreeSet<EntityId> {
        &self.parents[id.0]
    }

    pub fn children(&self, id: EntityId) -> &BTreeSet<EntityId> {
        &self.children[id.0]
    }

    fn down(&self, from: BTreeSet<EntityId>) -> BTreeSet<EntityId> {
        from.iter().flat_map(|id| self.children[id.0].iter().copied()).collect()
    }

    fn up(&self, from: BTreeSet<EntityId>) -> BTreeSet<EntityId> {
        from.iter().flat_map(|id| self.parents[id.0].iter().copied()).collect()
    }

    // Traversal

    /// Operators related to an entity
    pub fn operators(&self, id: EntityId) -> BTreeSet<EntityId> {
        let this = BTreeSet::from([id]);
        match self.entity(id).onestop_type() {
            OnestopType::Feed => self.down(this),
            OnestopType::Operator => this,
            OnestopType::Route => self.up(this),
            OnestopType::Stop => self.up(self.up(this)),
        }
    }

    /// Routes related to an entity
    pub fn routes(&self, id: EntityId) -> BTreeSet<EntityId> {
        let this = BTreeSet::from([id]);
        match self.entity(id).onestop_type() {
            OnestopType::Feed => self.down(self.down(this)),
            OnestopType::Operator => self.down(this),
            OnestopType::Route => this,
            OnestopType::Stop => self.up(this),
        }
    }

    /// Stops related to an entity
    pub fn stops(&self, id: EntityId) -> BTreeSet<EntityId> {
        let this = BTreeSet::from([id]);
        match self.entity(id).onestop_type() {
            OnestopType::Feed => self.down(self.down(self.down(this))),
            OnestopType::Operator => self.down(self.down(this)),
            OnestopType::Route => self.down(this),
            OnestopType::Stop => this,
        }
    }

    // Identity

    /// Geohash of an entity.
    ///
    /// An explicitly set geohash wins. A stop is hashed at full precision
    /// from its own point; other kinds use the neighbor fit of their stops.
    pub fn geohash(&self, id: EntityId) -> Result<String> {
        let entity = self.entity(id);
        if let Some(cached) = entity.cached_geohash() {
            return Ok(cached.to_string());
        }
        match entity.onestop_type() {
            OnestopType::Stop => {
                let point = entity.point()?;
                Ok(geohash::encode(point.y, point.x, MAX_LENGTH))
            }
            _ => geohash_features(self.stops(id).into_iter().map(|s| self.entity(s))),
        }
    }

    /// Onestop ID, from the cache when present
    pub fn onestop(&self, id: EntityId) -> Result<String> {
        match self.entity(id).cached_onestop() {
            Some(cached) => Ok(cached.to_string()),
            None => self.derive_onestop(id),
        }
    }

    /// Onestop ID recomputed from the current name and geohash
    pub fn derive_onestop(&self, id: EntityId) -> Result<String> {
        self.entity(id).make_onestop(&self.geohash(id)?)
    }

    /// Compute the Onestop ID if needed and commit it to the entity
    pub fn resolve_onestop(&mut self, id: EntityId) -> Result<String> {
        let onestop_id = self.onestop(id)?;
        self.entity_mut(id).set_onestop(onestop_id.clone());
        Ok(onestop_id)
    }

    /// Commit identifiers for every entity, stops first
    pub fn resolve_all(&mut self) -> Result<()> {
        for kind in [OnestopType::Stop, OnestopType::Route, OnestopType::Operator, OnestopType::Feed] {
            for id in self.of_type(kind) {
                self.resolve_onestop(id)?;
            }
        }
        Ok(())
    }

    /// Find an entity by Onestop ID
    pub fn find(&self, onestop_id: &str) -> Result<EntityId> {
        let kind = OnestopType::of(onestop_id)?;
        self.ids()
            .filter(|id| self.entity(*id).is(kind))
            .find(|id| self.onestop(*id).is_ok_and(|candidate| candidate == onestop_id))
            .ok_or_else(|| OnestopError::EntityNotFound { onestop_id: onestop_id.to_string() })
    }

    /// Find an entity by Onestop ID among the relatives of `scope`
    pub fn find_within(&self, scope: EntityId, onestop_id: &str) -> Result<EntityId> {
        let related = match OnestopType::of(onestop_id)? {
            OnestopType::Feed => BTreeSet::new(),
            OnestopType::Operator => self.operators(scope),
            OnestopType::Route => self.routes(scope),
            OnestopType::Stop => self.stops(scope),
        };
        related
            .into_iter()
            .find(|id| self.onestop(*id).is_ok_and(|candidate| candidate == onestop_id))
            .ok_or_else(|| OnestopError::EntityNotFound { onestop_id: onestop_id.to_string() })
    }

    fn onestops(&self, ids: BTreeSet<EntityId>) -> Result<BTreeSet<String>> {
        ids.into_iter().map(|id| self.onestop(id)).collect()
    }

    // Relationships

    /// Stops served by an operator or route
    pub fn serves(&self, id: EntityId) -> Result<BTreeSet<String>> {
        let mut served = self.onestops(self.stops(id))?;
        served.extend(self.entity(id).relations.serves.iter().cloned());
        Ok(served)
    }

    /// Operators serving a stop
    pub fn served_by(&self, id: EntityId) -> Result<BTreeSet<String>> {
        let mut operators = self.onestops(self.operators(id))?;
        operators.extend(self.entity(id).relations.served_by.iter().cloned());
        Ok(operators)
    }

    /// The operator of a route; the first by sorted identifier when several
    pub fn operated_by(&self, id: EntityId) -> Result<Option<String>> {
        let mut operators = self.onestops(self.operators(id))?;
        operators.extend(self.entity(id).relations.operated_by.iter().cloned());
        Ok(operators.into_iter().next())
    }

    /// Operators of a feed mapped to their GTFS agency id.
    ///
    /// Operators without an `agency_id` tag fall back to their mangled name.
    pub fn operators_in_feed(&self, id: EntityId) -> Result<BTreeMap<String, String>> {
        let mut operators = BTreeMap::new();
        for operator in self.operators(id) {
            let entity = self.entity(operator);
            let agency_id = match entity.tags.get(AGENCY_ID_TAG) {
                Some(agency_id) => agency_id.clone(),
                None => entity.mangled_name()?,
            };
            operators.insert(self.onestop(operator)?, agency_id);
        }
        for (onestop_id, agency_id) in &self.entity(id).relations.operators_in_feed {
            operators.entry(onestop_id.clone()).or_insert_with(|| agency_id.clone());
        }
        Ok(operators)
    }

    /// Copy of an entity that no longer needs this graph: its identifier is
    /// committed and its graph relationships are stored on the entity.
    pub fn detach(&self, id: EntityId) -> Result<Entity> {
        let mut entity = self.entity(id).clone();
        entity.set_onestop(self.onestop(id)?);
        match entity.onestop_type() {
            OnestopType::Feed => entity.relations.operators_in_feed = self.operators_in_feed(id)?,
            OnestopType::Operator => entity.relations.serves = self.serves(id)?,
            OnestopType::Route => {
                entity.relations.serves = self.serves(id)?;
                entity.relations.operated_by = self.operated_by(id)?.into_iter().collect();
            }
            OnestopType::Stop => entity.relations.served_by = self.served_by(id)?,
        }
        Ok(entity)
    }
}
