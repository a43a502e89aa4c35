// ============================================================
// Layer 5 — Named Variables
// ============================================================
// Burn identifies parameters by ParamId; checkpoints, scopes
// and moving averages want human-readable names. This module
// walks a module with Burn's visitor/mapper API to bridge the
// two:
//
//   list_variables     ParamId + dotted path + shape of every
//                      float parameter ("conv1.weight", …)
//   collect_values     name → flattened value snapshot
//   assign_values      replace parameters by name (restore, EMA)
//   retain_gradients   drop gradients of non-trainable params
//   l2_penalty         Σ w² over every `*.weight` parameter
//
// Paths come from enter_module/exit_module: each struct field
// the visitor descends into pushes its name, so a Linear field
// called `logits` yields `logits.weight` and `logits.bias`.

use std::collections::{HashMap, HashSet};

use burn::{
    module::{AutodiffModule, ModuleMapper, ModuleVisitor, Param, ParamId},
    optim::GradientsParams,
    prelude::*,
    tensor::backend::AutodiffBackend,
};

/// One float parameter of a module.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub id:    ParamId,
    pub name:  String,
    pub shape: Vec<usize>,
}

fn dotted(path: &[String]) -> String {
    path.iter()
        .filter(|segment| !segment.is_empty())
        .cloned()
        .collect::<Vec<_>>()
        .join(".")
}

// ─── Listing ──────────────────────────────────────────────────────────────────
struct VariableLister {
    path:  Vec<String>,
    found: Vec<Variable>,
}

impl<B: Backend> ModuleVisitor<B> for VariableLister {
    fn enter_module(&mut self, name: &str, _container_type: &str) {
        self.path.push(name.to_string());
    }

    fn exit_module(&mut self, _name: &str, _container_type: &str) {
        self.path.pop();
    }

    fn visit_float<const D: usize>(&mut self, param: &Param<Tensor<B, D>>) {
        self.found.push(Variable {
            id:    param.id,
            name:  dotted(&self.path),
            shape: param.val().dims().to_vec(),
        });
    }
}

/// Every float parameter in visiting order.
pub fn list_variables<B: Backend, M: Module<B>>(module: &M) -> Vec<Variable> {
    let mut lister = VariableLister { path: Vec::new(), found: Vec::new() };
    module.visit(&mut lister);
    lister.found
}

/// Just the names, for scope filtering.
pub fn variable_names<B: Backend, M: Module<B>>(module: &M) -> Vec<String> {
    list_variables::<B, M>(module).into_iter().map(|v| v.name).collect()
}

// ─── Value snapshots ──────────────────────────────────────────────────────────
struct ValueCollector<B: Backend> {
    path:   Vec<String>,
    values: HashMap<String, Tensor<B, 1>>,
}

impl<B: Backend> ModuleVisitor<B> for ValueCollector<B> {
    fn enter_module(&mut self, name: &str, _container_type: &str) {
        self.path.push(name.to_string());
    }

    fn exit_module(&mut self, _name: &str, _container_type: &str) {
        self.path.pop();
    }

    fn visit_float<const D: usize>(&mut self, param: &Param<Tensor<B, D>>) {
        let value = param.val();
        let numel = value.dims().iter().product::<usize>();
        self.values.insert(dotted(&self.path), value.reshape([numel]));
    }
}

/// Name → flattened copy of each float parameter.
pub fn collect_values<B: Backend, M: Module<B>>(module: &M) -> HashMap<String, Tensor<B, 1>> {
    let mut collector = ValueCollector { path: Vec::new(), values: HashMap::new() };
    module.visit(&mut collector);
    collector.values
}

struct ValueAssigner<'a, B: Backend> {
    names:    HashMap<ParamId, String>,
    values:   &'a HashMap<String, Tensor<B, 1>>,
    assigned: usize,
}

impl<B: Backend> ModuleMapper<B> for ValueAssigner<'_, B> {
    fn map_float<const D: usize>(&mut self, param: Param<Tensor<B, D>>) -> Param<Tensor<B, D>> {
        let Some(value) = self.names.get(&param.id).and_then(|name| self.values.get(name)) else {
            return param;
        };

        let (id, tensor, mapper) = param.consume();
        let tracked  = tensor.is_require_grad();
        let replaced = value
            .clone()
            .reshape(tensor.shape())
            .detach()
            .set_require_grad(tracked);

        self.assigned += 1;
        Param::from_mapped_value(id, replaced, mapper)
    }
}

/// Replace every parameter whose name appears in `values`.
/// Returns the new module and how many parameters were replaced.
pub fn assign_values<B: Backend, M: Module<B>>(
    module: M,
    values: &HashMap<String, Tensor<B, 1>>,
) -> (M, usize) {
    let names = list_variables::<B, M>(&module)
        .into_iter()
        .map(|v| (v.id, v.name))
        .collect();

    let mut assigner = ValueAssigner { names, values, assigned: 0 };
    let module = module.map(&mut assigner);
    (module, assigner.assigned)
}

// ─── Gradients ────────────────────────────────────────────────────────────────
struct GradientFilter<'a> {
    keep:    &'a HashSet<ParamId>,
    grads:   &'a mut GradientsParams,
    dropped: usize,
}

impl<B: AutodiffBackend> ModuleVisitor<B> for GradientFilter<'_> {
    fn visit_float<const D: usize>(&mut self, param: &Param<Tensor<B, D>>) {
        if self.keep.contains(&param.id) {
            return;
        }
        if self.grads.remove::<B::InnerBackend, D>(param.id).is_some() {
            self.dropped += 1;
        }
    }
}

/// Remove the gradient of every parameter not in `keep`, so the
/// optimizer leaves those parameters untouched. Returns how many
/// gradients were dropped.
pub fn retain_gradients<B: AutodiffBackend, M: AutodiffModule<B>>(
    module: &M,
    grads:  &mut GradientsParams,
    keep:   &HashSet<ParamId>,
) -> usize {
    let mut filter = GradientFilter { keep, grads, dropped: 0 };
    module.visit(&mut filter);
    filter.dropped
}

// ─── Regularisation ───────────────────────────────────────────────────────────
struct WeightSquares<B: Backend> {
    path:  Vec<String>,
    total: Option<Tensor<B, 1>>,
}

impl<B: Backend> ModuleVisitor<B> for WeightSquares<B> {
    fn enter_module(&mut self, name: &str, _container_type: &str) {
        self.path.push(name.to_string());
    }

    fn exit_module(&mut self, _name: &str, _container_type: &str) {
        self.path.pop();
    }

    fn visit_float<const D: usize>(&mut self, param: &Param<Tensor<B, D>>) {
        // biases are not decayed
        if self.path.last().map(String::as_str) != Some("weight") {
            return;
        }
        let squares = param.val().powf_scalar(2.0).sum();
        self.total = Some(match self.total.take() {
            Some(total) => total + squares,
            None        => squares,
        });
    }
}

/// `weight_decay * Σ w² / 2` over every `*.weight` parameter,
/// or `None` when the module has no weights or decay is 0.
pub fn l2_penalty<B: Backend, M: Module<B>>(module: &M, weight_decay: f64) -> Option<Tensor<B, 1>> {
    if weight_decay <= 0.0 {
        return None;
    }
    let mut squares = WeightSquares { path: Vec::new(), total: None };
    module.visit(&mut squares);
    squares.total.map(|total| total.mul_scalar(weight_decay / 2.0))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::nets::{LeNet, NetConfig};
    use burn::backend::NdArray;

    type TB = NdArray;

    fn lenet() -> LeNet<TB> {
        NetConfig::new(3, 8).init_lenet(&Default::default())
    }

    #[test]
    fn test_variable_names_follow_fields() {
        let names = variable_names::<TB, _>(&lenet());
        assert_eq!(
            names,
            vec![
                "conv1.weight", "conv1.bias",
                "conv2.weight", "conv2.bias",
                "fc3.weight",   "fc3.bias",
                "logits.weight", "logits.bias",
            ]
        );
    }

    #[test]
    fn test_shapes_are_reported() {
        let vars = list_variables::<TB, _>(&lenet());
        let logits = vars.iter().find(|v| v.name == "logits.weight").unwrap();
        // Linear weight is [d_input, d_output] in Burn
        assert_eq!(logits.shape, vec![1024, 3]);
    }

    #[test]
    fn test_assign_values_by_name() {
        let source = lenet();
        let target = lenet();

        let mut values = collect_values::<TB, _>(&source);
        values.retain(|name, _| name.starts_with("logits"));

        let (restored, count) = assign_values(target, &values);
        assert_eq!(count, 2);

        let got    = collect_values::<TB, _>(&restored);
        let want   = &values["logits.weight"];
        let diff: f32 = (got["logits.weight"].clone() - want.clone()).abs().max().into_scalar().elem();
        assert_eq!(diff, 0.0);

        // conv1 untouched: still equals the target's own init, not the source's
        let src_conv: f32 = collect_values::<TB, _>(&source)["conv1.weight"].clone().sum().into_scalar().elem();
        let got_conv: f32 = got["conv1.weight"].clone().sum().into_scalar().elem();
        assert_ne!(src_conv, got_conv);
    }

    #[test]
    fn test_l2_penalty_skips_biases() {
        let device = Default::default();
        let net: LeNet<TB> = NetConfig::new(3, 8).init_lenet(&device);

        let weights_only: f32 = variable_names::<TB, _>(&net)
            .iter()
            .filter(|n| n.ends_with(".weight"))
            .map(|n| {
                let v: f32 = collect_values::<TB, _>(&net)[n].clone().powf_scalar(2.0).sum().into_scalar().elem();
                v
            })
            .sum();

        let penalty: f32 = l2_penalty::<TB, _>(&net, 0.5).unwrap().into_scalar().elem();
        assert!((penalty - weights_only * 0.25).abs() / weights_only.max(1e-6) < 1e-4);
        assert!(l2_penalty::<TB, _>(&net, 0.0).is_none());
    }
}
