//! Timetable store: train schedules addressed by opaque ids

pub mod duration;
mod schedule;

pub use schedule::*;

use crate::imports::*;
use crate::utils::IdAllocator;
use std::collections::BTreeMap;

/// Identifier of a [TrainSchedule] within a [Timetable]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ScheduleId(pub u64);

impl fmt::Display for ScheduleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, SerdeAPI)]
pub struct Timetable {
    ids: IdAllocator,
    schedules: BTreeMap<ScheduleId, TrainSchedule>,
}

impl Default for Timetable {
    fn default() -> Self {
        Self {
            ids: IdAllocator::new("schedule"),
            schedules: BTreeMap::new(),
        }
    }
}

impl Init for Timetable {
    fn init(&mut self) -> Result<(), Error> {
        for schedule in self.schedules.values_mut() {
            schedule.init()?;
        }
        Ok(())
    }
}

impl Timetable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates and stores `schedule`, returning its new id
    pub fn create(&mut self, mut schedule: TrainSchedule) -> Result<ScheduleId, Error> {
        schedule.init()?;
        let id = ScheduleId(self.ids.next_id());
        debug!("created train schedule {id} `{}`", schedule.train_name);
        self.schedules.insert(id, schedule);
        Ok(id)
    }

    pub fn get(&self, id: ScheduleId) -> Result<&TrainSchedule, Error> {
        self.schedules.get(&id).ok_or(Error::UnknownSchedule(id))
    }

    /// Replaces the schedule stored under `id`, returning the previous one
    pub fn update(
        &mut self,
        id: ScheduleId,
        mut schedule: TrainSchedule,
    ) -> Result<TrainSchedule, Error> {
        let slot = self
            .schedules
            .get_mut(&id)
            .ok_or(Error::UnknownSchedule(id))?;
        schedule.init()?;
        Ok(std::mem::replace(slot, schedule))
    }

    /// Deletes every schedule in `ids`.  Nothing is deleted if any id is unknown.
    pub fn delete(&mut self, ids: &[ScheduleId]) -> Result<Vec<TrainSchedule>, Error> {
        if let Some(unknown) = ids.iter().find(|id| !self.schedules.contains_key(*id)) {
            return Err(Error::UnknownSchedule(*unknown));
        }
        let unique: std::collections::BTreeSet<ScheduleId> = ids.iter().copied().collect();
        let deleted = unique
            .into_iter()
            .filter_map(|id| self.schedules.remove(&id))
            .collect::<Vec<_>>();
        debug!("deleted {} train schedules", deleted.len());
        Ok(deleted)
    }

    /// Schedules in creation order
    pub fn iter(&self) -> impl Iterator<Item = (ScheduleId, &TrainSchedule)> {
        self.schedules.iter().map(|(id, schedule)| (*id, schedule))
    }

    pub fn ids(&self) -> Vec<ScheduleId> {
        self.schedules.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.schedules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schedules.is_empty()
    }
}
