pub fn ledger_view_key(group_id: &str) -> String {
    format!("ledger_view:{}", group_id)
}
