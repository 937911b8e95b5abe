//! Apply pipeline against a stateful fake document bridge: extract, validate
//! a proposal, apply with partial failure, check the report.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;

use varforge::changeset::{build_change_set, ProposedEdit, VariableCreate, VariableUpdate};
use varforge::model::{Collection, Mode, Value, Variable, VariableType};
use varforge::protocol::{
    DocumentChannel, PageScope, ProtocolError, UsageScan, VariableExtract,
};

/// In-memory document: applies updates to its store, rejects variables listed
/// in `locked`, assigns ids to creates.
struct FakeBridge {
    state: Mutex<DocState>,
    locked: Vec<String>,
}

struct DocState {
    variables: Vec<Variable>,
    collections: Vec<Collection>,
    next_id: u32,
}

impl FakeBridge {
    fn new(variables: Vec<Variable>, collections: Vec<Collection>, locked: &[&str]) -> Self {
        Self {
            state: Mutex::new(DocState {
                variables,
                collections,
                next_id: 100,
            }),
            locked: locked.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[async_trait]
impl DocumentChannel for FakeBridge {
    async fn extract_variables(&self) -> Result<VariableExtract, ProtocolError> {
        let state = self.state.lock().unwrap();
        Ok(VariableExtract {
            variables: state.variables.clone(),
            collections: state.collections.clone(),
        })
    }

    async fn scan_usage(
        &self,
        _query: Option<&str>,
        _scope: PageScope,
    ) -> Result<UsageScan, ProtocolError> {
        Ok(UsageScan::default())
    }

    async fn update_variable(&self, update: &VariableUpdate) -> Result<(), ProtocolError> {
        if self.locked.contains(&update.variable_name) {
            return Err(ProtocolError::Rejected("variable is locked".into()));
        }
        let mut state = self.state.lock().unwrap();
        let var = state
            .variables
            .iter_mut()
            .find(|v| v.id.as_deref() == Some(update.variable_id.as_str()))
            .ok_or_else(|| ProtocolError::Rejected("no such variable".into()))?;
        var.values_by_mode
            .insert(update.mode_id.clone(), update.value.clone());
        Ok(())
    }

    async fn create_variable(&self, create: &VariableCreate) -> Result<String, ProtocolError> {
        let mut state = self.state.lock().unwrap();
        let id = format!("VariableID:{}", state.next_id);
        state.next_id += 1;
        let collection_name = state
            .collections
            .iter()
            .find(|c| c.id == create.collection_id)
            .map(|c| c.name.clone())
            .ok_or_else(|| ProtocolError::Rejected("no such collection".into()))?;
        state.variables.push(Variable {
            id: Some(id.clone()),
            name: create.variable_name.clone(),
            var_type: create.var_type,
            collection_id: create.collection_id.clone(),
            collection_name,
            values_by_mode: BTreeMap::from([(create.mode_id.clone(), create.value.clone())]),
        });
        Ok(id)
    }

    async fn select_nodes(&self, _node_ids: &[String]) {}
}

fn seed() -> (Vec<Variable>, Vec<Collection>) {
    let collection = Collection {
        id: "c1".into(),
        name: "Primitives".into(),
        modes: vec![
            Mode { mode_id: "light".into(), name: "Light".into() },
            Mode { mode_id: "dark".into(), name: "Dark".into() },
        ],
    };
    let variables = ["surface", "accent", "border"]
        .iter()
        .enumerate()
        .map(|(i, name)| Variable {
            id: Some(format!("v{}", i + 1)),
            name: name.to_string(),
            var_type: VariableType::Color,
            collection_id: "c1".into(),
            collection_name: "Primitives".into(),
            values_by_mode: BTreeMap::from([(
                "light".to_string(),
                Value::color_hex("#000000").unwrap(),
            )]),
        })
        .collect();
    (variables, vec![collection])
}

fn update_edit(id: &str, hex: &str) -> ProposedEdit {
    ProposedEdit::Update {
        variable_id: id.into(),
        mode_id: "light".into(),
        value: Value::color_hex(hex).unwrap(),
    }
}

#[tokio::test]
async fn partial_failure_reports_successes_and_errors() {
    let (variables, collections) = seed();
    let bridge = FakeBridge::new(variables.clone(), collections.clone(), &["accent"]);

    let proposal = vec![
        update_edit("v1", "#111111"),
        update_edit("v2", "#222222"), // accent: locked, will fail
        update_edit("v3", "#333333"),
    ];
    let built = build_change_set(&proposal, &variables, &collections);
    assert!(built.warnings.is_empty());

    let report = varforge::apply(&bridge, &built.change_set).await.unwrap();
    assert_eq!(report.applied, 2);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].contains("accent"));

    // The two successful updates landed in the document.
    let extract = bridge.extract_variables().await.unwrap();
    let surface = extract
        .variables
        .iter()
        .find(|v| v.name == "surface")
        .unwrap();
    assert_eq!(
        surface.value_for_mode("light"),
        Some(&Value::color_hex("#111111").unwrap())
    );
}

#[tokio::test]
async fn creates_follow_updates_and_land_in_document() {
    let (variables, collections) = seed();
    let bridge = FakeBridge::new(variables.clone(), collections.clone(), &[]);

    let proposal = vec![
        update_edit("v1", "#101010"),
        ProposedEdit::Create {
            variable_name: "surface/raised".into(),
            collection_id: "c1".into(),
            mode_id: "dark".into(),
            var_type: VariableType::Color,
            value: Value::color_hex("#1A1A1A").unwrap(),
        },
    ];
    let built = build_change_set(&proposal, &variables, &collections);
    let report = varforge::apply(&bridge, &built.change_set).await.unwrap();

    assert_eq!(report.applied, 2);
    assert!(report.is_clean());

    let extract = bridge.extract_variables().await.unwrap();
    assert!(extract.variables.iter().any(|v| v.name == "surface/raised"));
}

#[tokio::test]
async fn invalid_proposal_applies_as_empty_not_error() {
    let (variables, collections) = seed();
    let bridge = FakeBridge::new(variables.clone(), collections.clone(), &[]);

    let proposal = vec![ProposedEdit::Update {
        variable_id: "ghost".into(),
        mode_id: "light".into(),
        value: Value::color_hex("#FFFFFF").unwrap(),
    }];
    let built = build_change_set(&proposal, &variables, &collections);
    assert_eq!(built.warnings.len(), 1);
    assert!(built.change_set.is_empty());

    let report = varforge::apply(&bridge, &built.change_set).await.unwrap();
    assert_eq!(report.applied, 0);
    assert!(report.is_clean());
}
