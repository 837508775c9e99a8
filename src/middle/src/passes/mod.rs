pub(crate) mod constant_folder;
pub(crate) mod dead_code_eliminator;
pub(crate) mod expression_splitter;
pub(crate) mod fold_if;
pub(crate) mod for_loop_eliminator;
pub(crate) mod for_loop_simplifier;
pub(crate) mod function_pruner;
pub(crate) mod leave_normalizer;
pub(crate) mod name_mangler;
pub(crate) mod revert_normalizer;
pub(crate) mod scope_flattener;
pub(crate) mod switch_to_if;
pub(crate) mod variable_inliner;
