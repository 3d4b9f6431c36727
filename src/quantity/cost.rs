quantity!(Cost, "¤", 4);
