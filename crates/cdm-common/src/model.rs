//! The group / dimension / variable / attribute graph of an opened file.
//!
//! Groups live in an arena owned by the model and refer to each other by
//! [`GroupId`]. A [`ModelBuilder`] is mutable; [`ModelBuilder::freeze`]
//! produces a [`CdmModel`] whose only remaining mutation is growth of
//! unlimited dimensions.

use tracing::debug;

use crate::attribute::{find_attribute, Attribute};
use crate::datatype::DataType;
use crate::dimension::Dimension;
use crate::error::{CdmError, CdmResult};
use crate::variable::Variable;

/// Index of a group in its model's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(usize);

impl GroupId {
    pub const ROOT: GroupId = GroupId(0);

    pub fn index(&self) -> usize {
        self.0
    }
}

/// A namespace of dimensions, variables, attributes and subgroups.
#[derive(Debug, Clone)]
pub struct Group {
    name: String,
    parent: Option<GroupId>,
    children: Vec<GroupId>,
    dimensions: Vec<Dimension>,
    variables: Vec<Variable>,
    attributes: Vec<Attribute>,
}

impl Group {
    fn new(name: impl Into<String>, parent: Option<GroupId>) -> Self {
        Self {
            name: name.into(),
            parent,
            children: Vec::new(),
            dimensions: Vec::new(),
            variables: Vec::new(),
            attributes: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<GroupId> {
        self.parent
    }

    pub fn children(&self) -> &[GroupId] {
        &self.children
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn find_attribute(&self, name: &str) -> Option<&Attribute> {
        find_attribute(&self.attributes, name)
    }

    fn find_local_dimension(&self, name: &str) -> Option<&Dimension> {
        self.dimensions.iter().find(|d| d.name() == Some(name))
    }

    fn find_local_variable(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.name() == name)
    }
}

/// Resolve a dimension by name in `group` or its ancestors.
fn resolve_dimension<'a>(groups: &'a [Group], group: GroupId, name: &str) -> Option<&'a Dimension> {
    let mut current = Some(group);
    while let Some(id) = current {
        let g = groups.get(id.0)?;
        if let Some(dim) = g.find_local_dimension(name) {
            return Some(dim);
        }
        current = g.parent;
    }
    None
}

fn find_child(groups: &[Group], parent: GroupId, name: &str) -> Option<GroupId> {
    groups
        .get(parent.0)?
        .children
        .iter()
        .copied()
        .find(|c| groups[c.0].name == name)
}

/// Mutable model under construction.
#[derive(Debug, Clone)]
pub struct ModelBuilder {
    groups: Vec<Group>,
}

impl Default for ModelBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelBuilder {
    pub fn new() -> Self {
        Self {
            groups: vec![Group::new("", None)],
        }
    }

    pub fn root(&self) -> GroupId {
        GroupId::ROOT
    }

    fn group_mut(&mut self, id: GroupId) -> CdmResult<&mut Group> {
        self.groups
            .get_mut(id.0)
            .ok_or_else(|| CdmError::schema(format!("no group with index {}", id.0)))
    }

    /// Add a subgroup under `parent`.
    pub fn add_group(&mut self, parent: GroupId, name: impl Into<String>) -> CdmResult<GroupId> {
        let name = name.into();
        if name.is_empty() || name.contains('/') {
            return Err(CdmError::schema(format!("invalid group name '{}'", name)));
        }
        if find_child(&self.groups, parent, &name).is_some() {
            return Err(CdmError::schema(format!("duplicate group '{}'", name)));
        }
        let id = GroupId(self.groups.len());
        self.group_mut(parent)?.children.push(id);
        self.groups.push(Group::new(name, Some(parent)));
        Ok(id)
    }

    /// Add a shared dimension to `group`, returning the stored handle.
    pub fn add_dimension(&mut self, group: GroupId, mut dim: Dimension) -> CdmResult<Dimension> {
        let name = match dim.name() {
            Some(name) if dim.is_shared() => name.to_string(),
            _ => {
                return Err(CdmError::schema(
                    "only shared, named dimensions can be added to a group",
                ))
            }
        };
        let g = self.group_mut(group)?;
        if g.find_local_dimension(&name).is_some() {
            return Err(CdmError::schema(format!("duplicate dimension '{}'", name)));
        }
        dim.set_group(group);
        g.dimensions.push(dim.clone());
        Ok(dim)
    }

    /// Find a dimension by name in `group` or any ancestor.
    pub fn find_dimension(&self, group: GroupId, name: &str) -> Option<&Dimension> {
        resolve_dimension(&self.groups, group, name)
    }

    /// Parse a whitespace-separated dimension string in the scope of `group`.
    ///
    /// `*` is a variable-length dimension, an integer is a private dimension
    /// of that length and anything else must name a visible dimension.
    pub fn parse_dimensions(&self, group: GroupId, text: &str) -> CdmResult<Vec<Dimension>> {
        text.split_whitespace()
            .map(|token| {
                if token == "*" {
                    return Ok(Dimension::vlen());
                }
                if let Ok(length) = token.parse::<i64>() {
                    return Dimension::with_flags(
                        None,
                        length,
                        crate::dimension::DimensionFlags::PRIVATE,
                    );
                }
                self.find_dimension(group, token)
                    .cloned()
                    .ok_or_else(|| CdmError::schema(format!("unknown dimension '{}'", token)))
            })
            .collect()
    }

    /// Create a variable whose dimensions are given as a dimension string.
    pub fn new_variable(
        &self,
        group: GroupId,
        name: impl Into<String>,
        data_type: DataType,
        dims: &str,
    ) -> CdmResult<Variable> {
        Ok(Variable::new(name, data_type, self.parse_dimensions(group, dims)?))
    }

    /// Add a variable to `group`.
    ///
    /// Shared dimensions are re-bound to the group's own handles so that the
    /// variable observes later growth of unlimited dimensions.
    pub fn add_variable(&mut self, group: GroupId, mut var: Variable) -> CdmResult<()> {
        for dim in var.dimensions_mut() {
            if !dim.is_shared() {
                continue;
            }
            let name = dim.name().unwrap_or_default();
            let bound = self.find_dimension(group, name).ok_or_else(|| {
                CdmError::schema(format!("variable dimension '{}' is not defined", name))
            })?;
            if bound.length() != dim.length() || bound.flags() != dim.flags() {
                return Err(CdmError::schema(format!(
                    "variable dimension '{}' conflicts with the group's definition",
                    name
                )));
            }
            *dim = bound.clone();
        }

        let g = self.group_mut(group)?;
        if g.find_local_variable(var.name()).is_some() {
            return Err(CdmError::schema(format!("duplicate variable '{}'", var.name())));
        }
        var.set_group(group);
        g.variables.push(var);
        Ok(())
    }

    /// Add an attribute to `group`, replacing one of the same name.
    pub fn add_attribute(&mut self, group: GroupId, attribute: Attribute) -> CdmResult<()> {
        let g = self.group_mut(group)?;
        match g.attributes.iter_mut().find(|a| a.name == attribute.name) {
            Some(existing) => *existing = attribute,
            None => g.attributes.push(attribute),
        }
        Ok(())
    }

    /// Mutable access to a variable during construction.
    pub fn find_variable_mut(&mut self, group: GroupId, name: &str) -> Option<&mut Variable> {
        self.groups
            .get_mut(group.0)?
            .variables
            .iter_mut()
            .find(|v| v.name() == name)
    }

    pub fn find_variable(&self, group: GroupId, name: &str) -> Option<&Variable> {
        self.groups.get(group.0)?.find_local_variable(name)
    }

    /// Freeze the graph.
    pub fn freeze(self) -> CdmModel {
        let variables: usize = self.groups.iter().map(|g| g.variables.len()).sum();
        debug!(
            groups = self.groups.len(),
            variables = variables,
            "Froze data model"
        );
        CdmModel {
            groups: self.groups,
        }
    }
}

/// Immutable data model of an opened file.
#[derive(Debug, Clone)]
pub struct CdmModel {
    groups: Vec<Group>,
}

impl CdmModel {
    pub fn root(&self) -> &Group {
        &self.groups[0]
    }

    pub fn group(&self, id: GroupId) -> Option<&Group> {
        self.groups.get(id.0)
    }

    /// Resolve a `/`-separated group path; an empty path is the root.
    pub fn find_group(&self, path: &str) -> Option<GroupId> {
        let mut current = GroupId::ROOT;
        for part in path.split('/').filter(|p| !p.is_empty()) {
            current = find_child(&self.groups, current, part)?;
        }
        Some(current)
    }

    /// Find a variable by full name, e.g. `radar/Reflectivity`.
    pub fn find_variable(&self, full_name: &str) -> Option<&Variable> {
        let trimmed = full_name.trim_start_matches('/');
        let (path, name) = match trimmed.rsplit_once('/') {
            Some((path, name)) => (path, name),
            None => ("", trimmed),
        };
        let group = self.find_group(path)?;
        self.groups[group.0].find_local_variable(name)
    }

    pub fn find_dimension(&self, group: GroupId, name: &str) -> Option<&Dimension> {
        resolve_dimension(&self.groups, group, name)
    }

    /// All variables, group by group in creation order.
    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.groups.iter().flat_map(|g| g.variables.iter())
    }

    pub fn global_attributes(&self) -> &[Attribute] {
        &self.groups[0].attributes
    }

    pub fn find_global_attribute(&self, name: &str) -> Option<&Attribute> {
        find_attribute(self.global_attributes(), name)
    }

    /// First unlimited dimension in the model, if any.
    pub fn unlimited_dimension(&self) -> Option<&Dimension> {
        self.groups
            .iter()
            .flat_map(|g| g.dimensions.iter())
            .find(|d| d.is_unlimited())
    }

    /// `/`-separated path of a variable, without a leading slash.
    pub fn full_name(&self, var: &Variable) -> String {
        let mut parts = vec![var.name().to_string()];
        let mut current = var.group();
        while let Some(id) = current {
            let g = &self.groups[id.0];
            if g.parent.is_some() {
                parts.push(g.name.clone());
            }
            current = g.parent;
        }
        parts.reverse();
        parts.join("/")
    }

    /// Grow the named unlimited dimension; the only post-freeze mutation.
    ///
    /// The new length is visible through every variable of the model.
    pub fn grow_unlimited(&self, name: &str, new_length: usize) -> CdmResult<()> {
        let dim = self
            .groups
            .iter()
            .flat_map(|g| g.dimensions.iter())
            .find(|d| d.name() == Some(name))
            .ok_or_else(|| CdmError::schema(format!("unknown dimension '{}'", name)))?;
        dim.grow(new_length)?;
        debug!(dimension = name, length = new_length, "Grew unlimited dimension");
        Ok(())
    }
}
