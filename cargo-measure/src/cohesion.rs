//! LCOM4 cohesion: the number of connected components formed by the
//! methods of a class and the members they reference.
//!
//! Two methods are related when one references the other or when both
//! reference a common member. Related pairs are clustered into components;
//! a class whose methods form a single component is fully cohesive.
use crate::context::Context;
use crate::error::Result;
use crate::frontend::{bare_name, Invocation, Listener, Receiver};
use crate::metrics::{Metric, LCOM4};
use crate::parser::{AggregationPolicy, ClassTable, ClassValue, MetricParser};
use log::debug;
use std::collections::HashSet;

/// Identity of a member within its [`ClassMembers`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemberId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    Field,
    Method,
}

#[derive(Debug, Clone)]
pub struct Member {
    pub name: String,
    pub kind: MemberKind,
    pub class_name: String,
    pub references: HashSet<MemberId>,
}

/// The fields and methods of one class, in discovery order.
#[derive(Debug, Clone, Default)]
pub struct ClassMembers {
    class_name: String,
    members: Vec<Member>,
}

impl ClassMembers {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            members: Vec::new(),
        }
    }

    /// Add a member, or return the existing one with the same name and kind.
    pub fn add(&mut self, name: &str, kind: MemberKind) -> MemberId {
        if let Some(id) = self.find(name, kind) {
            return id;
        }
        self.members.push(Member {
            name: name.to_string(),
            kind,
            class_name: self.class_name.clone(),
            references: HashSet::new(),
        });
        MemberId(self.members.len() - 1)
    }

    pub fn find(&self, name: &str, kind: MemberKind) -> Option<MemberId> {
        self.members
            .iter()
            .position(|m| m.kind == kind && m.name == name)
            .map(MemberId)
    }

    /// Record that `from` calls or accesses `to`.
    pub fn reference(&mut self, from: MemberId, to: MemberId) {
        if from != to {
            self.members[from.0].references.insert(to);
        }
    }

    pub fn get(&self, id: MemberId) -> &Member {
        &self.members[id.0]
    }

    pub fn methods(&self) -> impl Iterator<Item = MemberId> + '_ {
        self.members
            .iter()
            .enumerate()
            .filter(|(_, m)| m.kind == MemberKind::Method)
            .map(|(i, _)| MemberId(i))
    }

    fn methods_named<'a>(&'a self, bare: &'a str) -> impl Iterator<Item = MemberId> + 'a {
        self.methods()
            .filter(move |&id| bare_name(&self.get(id).name) == bare)
    }

    fn names(&self, ids: &HashSet<MemberId>) -> Vec<&str> {
        let mut names: Vec<&str> = ids.iter().map(|&id| self.get(id).name.as_str()).collect();
        names.sort_unstable();
        names
    }
}

/// A set of members known to be connected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Component {
    members: HashSet<MemberId>,
}

impl Component {
    pub fn members(&self) -> &HashSet<MemberId> {
        &self.members
    }

    pub fn contains(&self, id: MemberId) -> bool {
        self.members.contains(&id)
    }

    /// Whether the pair `m`, `n` belongs with this component: either method
    /// is in it, one of their references is in it, or one of their
    /// references is also referenced by a member of it.
    fn matches(
        &self,
        class: &ClassMembers,
        m: MemberId,
        n: MemberId,
        pair_refs: &HashSet<MemberId>,
    ) -> bool {
        self.contains(m)
            || self.contains(n)
            || pair_refs.iter().any(|r| self.members.contains(r))
            || self
                .members
                .iter()
                .any(|&x| !class.get(x).references.is_disjoint(pair_refs))
    }

    fn absorb_pair(&mut self, class: &ClassMembers, m: MemberId, n: MemberId) {
        self.members.insert(m);
        self.members.insert(n);
        self.members.extend(class.get(m).references.iter().copied());
        self.members.extend(class.get(n).references.iter().copied());
    }
}

fn directly_related(class: &ClassMembers, m: MemberId, n: MemberId) -> bool {
    let (a, b) = (class.get(m), class.get(n));
    a.references.contains(&n)
        || b.references.contains(&m)
        || !a.references.is_disjoint(&b.references)
}

fn place_pair(class: &ClassMembers, components: &mut Vec<Component>, m: MemberId, n: MemberId) {
    let pair_refs: HashSet<MemberId> = class
        .get(m)
        .references
        .union(&class.get(n).references)
        .copied()
        .collect();
    let matched: Vec<usize> = components
        .iter()
        .enumerate()
        .filter(|(_, c)| c.matches(class, m, n, &pair_refs))
        .map(|(i, _)| i)
        .collect();

    match matched.as_slice() {
        [] => {
            let mut component = Component::default();
            component.absorb_pair(class, m, n);
            debug!("new component {:?}", class.names(&component.members));
            components.push(component);
        }
        [index] => {
            components[*index].absorb_pair(class, m, n);
            debug!(
                "joined component {:?}",
                class.names(&components[*index].members)
            );
        }
        _ => {
            // The pair bridges several components: replace them by their union.
            let mut consolidated = Component::default();
            for &index in matched.iter().rev() {
                let component = components.remove(index);
                consolidated.members.extend(component.members);
            }
            consolidated.absorb_pair(class, m, n);
            debug!(
                "consolidated {} components into {:?}",
                matched.len(),
                class.names(&consolidated.members)
            );
            components.push(consolidated);
        }
    }
}

/// Cluster the methods of `class` into connected components.
///
/// Every method ends up in exactly one component; a method related to no
/// other method forms a component of its own.
pub fn connected_components(class: &ClassMembers) -> Vec<Component> {
    let methods: Vec<MemberId> = class.methods().collect();
    let mut components: Vec<Component> = Vec::new();

    for (i, &m) in methods.iter().enumerate() {
        for &n in &methods[i + 1..] {
            if directly_related(class, m, n) {
                debug!(
                    "{}: {} and {} are related",
                    class.class_name,
                    class.get(m).name,
                    class.get(n).name
                );
                place_pair(class, &mut components, m, n);
            }
        }
    }

    for &m in &methods {
        if !components.iter().any(|c| c.contains(m)) {
            components.push(Component {
                members: HashSet::from([m]),
            });
        }
    }
    components
}

/// LCOM4 of a class. Never lower than one.
pub fn lcom4(class: &ClassMembers) -> usize {
    if class.methods().count() <= 1 {
        return 1;
    }
    connected_components(class).len()
}

#[derive(Debug, Default)]
struct RawMethod {
    name: String,
    fields: Vec<String>,
    calls: Vec<String>,
}

#[derive(Debug, Default)]
struct RawClass {
    fields: Vec<String>,
    methods: Vec<RawMethod>,
}

impl RawClass {
    /// Resolve the names collected during the walk into members. Fields
    /// accessed but declared elsewhere are added as fields; calls to methods
    /// not defined here are dropped.
    fn into_members(self, class_name: &str) -> ClassMembers {
        let mut class = ClassMembers::new(class_name);
        let accessed = self.methods.iter().flat_map(|m| m.fields.iter());
        for field in self.fields.iter().chain(accessed) {
            class.add(field, MemberKind::Field);
        }
        let ids: Vec<MemberId> = self
            .methods
            .iter()
            .map(|m| class.add(&m.name, MemberKind::Method))
            .collect();

        for (method, &id) in self.methods.iter().zip(&ids) {
            for field in &method.fields {
                if let Some(target) = class.find(field, MemberKind::Field) {
                    class.reference(id, target);
                }
            }
            for call in &method.calls {
                let targets: Vec<MemberId> = class.methods_named(call).collect();
                for target in targets {
                    class.reference(id, target);
                }
            }
        }
        class
    }
}

#[derive(Debug, Default)]
pub struct CohesionListener {
    classes: ClassTable<RawClass>,
    in_method: bool,
}

impl CohesionListener {
    fn current_method(&mut self) -> Option<&mut RawMethod> {
        if !self.in_method {
            return None;
        }
        self.classes.current_mut()?.methods.last_mut()
    }
}

impl Listener for CohesionListener {
    fn enter_class(&mut self, name: &str) {
        self.classes.enter(name);
    }

    fn exit_class(&mut self, _name: &str) {
        self.classes.exit();
    }

    fn field(&mut self, name: &str) {
        if let Some(class) = self.classes.current_mut() {
            if !class.fields.iter().any(|f| f == name) {
                class.fields.push(name.to_string());
            }
        }
    }

    fn enter_method(&mut self, name: &str) {
        if let Some(class) = self.classes.current_mut() {
            class.methods.push(RawMethod {
                name: name.to_string(),
                ..RawMethod::default()
            });
            self.in_method = true;
        }
    }

    fn exit_method(&mut self, _name: &str) {
        self.in_method = false;
    }

    fn invocation(&mut self, call: &Invocation) {
        if call.receiver != Receiver::OwnType {
            return;
        }
        if let Some(method) = self.current_method() {
            method.calls.push(call.name.clone());
        }
    }

    fn field_access(&mut self, name: &str) {
        if let Some(method) = self.current_method() {
            method.fields.push(name.to_string());
        }
    }
}

#[derive(Debug, Clone)]
pub struct CohesionParser {
    metric: Metric,
}

impl CohesionParser {
    pub fn new(ctx: &Context) -> Result<Self> {
        Ok(Self {
            metric: ctx.metric(LCOM4)?.clone(),
        })
    }
}

impl MetricParser for CohesionParser {
    type Listener = CohesionListener;

    fn metric(&self) -> &Metric {
        &self.metric
    }

    fn policy(&self) -> AggregationPolicy {
        AggregationPolicy::WorstOf
    }

    fn extract(&self, listener: CohesionListener) -> Vec<ClassValue> {
        listener
            .classes
            .into_entries()
            .into_iter()
            .map(|(name, raw)| {
                let members = raw.into_members(&name);
                ClassValue {
                    value: lcom4(&members) as f64,
                    name,
                    element_count: 1,
                    methods: Vec::new(),
                }
            })
            .collect()
    }
}
