//! Archive driver: create/extract/list/update/delete orchestration over
//! the AR codec (§4.8, §4.9).
//!
//! `update` and `delete` have no dedicated on-disk algorithm in §4.8
//! beyond "rebuild the member list and recreate" — both are implemented
//! here by decompressing every surviving member back to raw bytes and
//! calling [`ar::create`] again, matching that guidance.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::AtomicBool;

use crate::ar::{self, MemberFlags};
use crate::arena::Arena;
use crate::error::{Error, Result};

use super::{check_cancelled, report, ProgressCallback};

/// Summary of one archive member, for `arch list` (§6.4).
#[derive(Debug, Clone)]
pub struct MemberSummary {
    pub name: String,
    pub uncompressed_size: u64,
    pub compressed_size: u64,
    pub flags: MemberFlags,
    pub mtime: u32,
}

/// Owns the arena for the duration of one archive operation (§5).
pub struct ArchiveDriver {
    arena: Arena,
}

impl Default for ArchiveDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveDriver {
    pub fn new() -> Self {
        Self { arena: Arena::new() }
    }

    pub fn create(
        &mut self,
        inputs: &[ar::MemberInput],
        config: &ar::CreateConfig,
        mut progress: Option<&mut ProgressCallback>,
        cancel: Option<&AtomicBool>,
    ) -> Result<Vec<u8>> {
        report(&mut progress, "creating", 0);
        check_cancelled(cancel)?;
        let out = ar::create(inputs, config)?;
        report(&mut progress, "done", 100);
        Ok(out)
    }

    pub fn list(&mut self, archive_bytes: &[u8]) -> Result<Vec<MemberSummary>> {
        self.arena.reset();
        let archive = ar::Archive::parse(archive_bytes, &mut self.arena)?;
        Ok(archive
            .members
            .iter()
            .map(|member| MemberSummary {
                name: member.name.clone(),
                uncompressed_size: member.header.uncompressed_size,
                compressed_size: member.header.compressed_size,
                flags: member.header.flags,
                mtime: member.header.mtime,
            })
            .collect())
    }

    /// Extracts one named member, or every member when `member_name` is
    /// `None`.
    pub fn extract(
        &mut self,
        archive_bytes: &[u8],
        member_name: Option<&str>,
        mut progress: Option<&mut ProgressCallback>,
        cancel: Option<&AtomicBool>,
    ) -> Result<Vec<(String, Vec<u8>)>> {
        self.arena.reset();
        report(&mut progress, "extracting", 0);
        check_cancelled(cancel)?;
        let archive = ar::Archive::parse(archive_bytes, &mut self.arena)?;
        let out = match member_name {
            Some(name) => {
                let index = archive
                    .find_by_name(name)
                    .ok_or_else(|| Error::MemberNotFound(name.to_string()))?;
                vec![(name.to_string(), archive.extract_member(&self.arena, index)?)]
            }
            None => {
                let mut out = Vec::with_capacity(archive.members.len());
                for (i, member) in archive.members.iter().enumerate() {
                    check_cancelled(cancel)?;
                    out.push((member.name.clone(), archive.extract_member(&self.arena, i)?));
                }
                out
            }
        };
        report(&mut progress, "done", 100);
        Ok(out)
    }

    /// Rebuilds the archive: members named in `replacements` get new
    /// content (added if not already present), every other existing
    /// member is carried over unchanged.
    pub fn update(
        &mut self,
        archive_bytes: &[u8],
        replacements: &[(String, Vec<u8>)],
        config: &ar::CreateConfig,
        mut progress: Option<&mut ProgressCallback>,
        cancel: Option<&AtomicBool>,
    ) -> Result<Vec<u8>> {
        self.arena.reset();
        report(&mut progress, "updating", 0);
        check_cancelled(cancel)?;
        let archive = ar::Archive::parse(archive_bytes, &mut self.arena)?;

        let mut pending: HashMap<&str, &[u8]> = replacements
            .iter()
            .map(|(name, data)| (name.as_str(), data.as_slice()))
            .collect();

        let mut owned: Vec<(String, Vec<u8>, MemberFlags, u32)> = Vec::with_capacity(archive.members.len());
        for (i, member) in archive.members.iter().enumerate() {
            check_cancelled(cancel)?;
            if let Some(data) = pending.remove(member.name.as_str()) {
                owned.push((member.name.clone(), data.to_vec(), member.header.flags, member.header.mtime));
            } else {
                let data = archive.extract_member(&self.arena, i)?;
                owned.push((member.name.clone(), data, member.header.flags, member.header.mtime));
            }
        }
        for (name, data) in replacements {
            if pending.contains_key(name.as_str()) {
                owned.push((name.clone(), data.clone(), MemberFlags::empty(), config.creation_timestamp));
            }
        }

        report(&mut progress, "rebuilding", 60);
        let inputs: Vec<ar::MemberInput> = owned
            .iter()
            .map(|(name, data, flags, mtime)| ar::MemberInput {
                name: name.clone(),
                data: data.as_slice(),
                flags: *flags,
                mtime: *mtime,
            })
            .collect();
        let out = ar::create(&inputs, config)?;
        report(&mut progress, "done", 100);
        Ok(out)
    }

    /// Rebuilds the archive with every member named in `names` removed.
    pub fn delete(
        &mut self,
        archive_bytes: &[u8],
        names: &[String],
        config: &ar::CreateConfig,
        mut progress: Option<&mut ProgressCallback>,
        cancel: Option<&AtomicBool>,
    ) -> Result<Vec<u8>> {
        self.arena.reset();
        report(&mut progress, "deleting", 0);
        check_cancelled(cancel)?;
        let archive = ar::Archive::parse(archive_bytes, &mut self.arena)?;
        let remove: HashSet<&str> = names.iter().map(String::as_str).collect();

        let mut owned: Vec<(String, Vec<u8>, MemberFlags, u32)> = Vec::new();
        for (i, member) in archive.members.iter().enumerate() {
            check_cancelled(cancel)?;
            if remove.contains(member.name.as_str()) {
                continue;
            }
            let data = archive.extract_member(&self.arena, i)?;
            owned.push((member.name.clone(), data, member.header.flags, member.header.mtime));
        }

        report(&mut progress, "rebuilding", 60);
        let inputs: Vec<ar::MemberInput> = owned
            .iter()
            .map(|(name, data, flags, mtime)| ar::MemberInput {
                name: name.clone(),
                data: data.as_slice(),
                flags: *flags,
                mtime: *mtime,
            })
            .collect();
        let out = ar::create(&inputs, config)?;
        report(&mut progress, "done", 100);
        Ok(out)
    }
}
