fn main() { ::ljcap_tasks::entry_points::forces(); }
